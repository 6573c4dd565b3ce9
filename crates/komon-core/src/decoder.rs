//! Decoder for Kafka's internal `__consumer_offsets` record formats.
//!
//! The commit topic carries big-endian, length-prefixed structures written
//! by the broker's group coordinator. Every record key starts with an i16
//! discriminator: versions 0 and 1 are offset commits, version 2 is group
//! metadata, anything newer is unknown to this decoder. Offset-commit
//! values carry their own schema version (0 through 3 are handled here).
//!
//! Decoding is deterministic and side-effect-free apart from logging. A
//! malformed record never reaches the caller as an error: [`decode`]
//! returns `None` and the listener moves on to the next record.

use bytes::Buf;
use tracing::{error, info};

use crate::error::DecodeError;
use crate::state::{GroupTopicPartition, OffsetRecord, TopicPartition};

const KEY_V0_OFFSET_COMMIT: i16 = 0;
const KEY_V1_OFFSET_COMMIT: i16 = 1;
const KEY_V2_GROUP_METADATA: i16 = 2;

/// What a record key turned out to identify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind {
    /// An offset commit for this (group, topic, partition)
    OffsetCommit(GroupTopicPartition),
    /// Group membership metadata; carries only the group name
    GroupMetadata(String),
    /// A discriminator this decoder does not know
    Unknown(i16),
}

/// Decode one record from the commit topic.
///
/// Returns the committed offset tuple for offset-commit records, `None`
/// for tombstones, group-metadata records, unknown key variants and any
/// parse failure.
pub fn decode(key: Option<&[u8]>, value: Option<&[u8]>) -> Option<(GroupTopicPartition, OffsetRecord)> {
    let (Some(key), Some(value)) = (key, value) else {
        info!("skipping record with null key or value");
        return None;
    };

    match decode_key(key) {
        Ok(KeyKind::OffsetCommit(gtp)) => match decode_offset_value(value) {
            Ok(record) => Some((gtp, record)),
            Err(e) => {
                error!(
                    group = %gtp.group,
                    topic = %gtp.topic,
                    partition = gtp.partition,
                    error = %e,
                    "failed to decode offset commit value"
                );
                None
            }
        },
        Ok(KeyKind::GroupMetadata(group)) => {
            info!(group = %group, "skipping group metadata record");
            None
        }
        Ok(KeyKind::Unknown(version)) => {
            info!(version, "skipping record with unknown key variant");
            None
        }
        Err(e) => {
            error!(error = %e, "failed to decode record key");
            None
        }
    }
}

/// Parse a record key down to its variant.
pub fn decode_key(key: &[u8]) -> Result<KeyKind, DecodeError> {
    let mut reader = Reader::new(key);
    let version = reader.read_i16()?;

    match version {
        KEY_V0_OFFSET_COMMIT | KEY_V1_OFFSET_COMMIT => {
            let group = reader.read_string()?;
            let topic = reader.read_string()?;
            let partition = reader.read_i32()?;
            Ok(KeyKind::OffsetCommit(GroupTopicPartition {
                group,
                topic,
                partition,
            }))
        }
        KEY_V2_GROUP_METADATA => {
            let group = reader.read_string()?;
            Ok(KeyKind::GroupMetadata(group))
        }
        other => Ok(KeyKind::Unknown(other)),
    }
}

/// Parse an offset-commit value.
///
/// Schema v1 carries an explicit expire timestamp; for the other versions
/// the expire timestamp falls back to the commit timestamp so the record
/// is always fully populated. v3's leader epoch is read and discarded.
pub fn decode_offset_value(value: &[u8]) -> Result<OffsetRecord, DecodeError> {
    let mut reader = Reader::new(value);
    let version = reader.read_i16()?;

    match version {
        0 => {
            let offset = reader.read_i64()?;
            let metadata = reader.read_string()?;
            let timestamp = reader.read_i64()?;
            Ok(OffsetRecord {
                offset,
                metadata,
                commit_timestamp: timestamp,
                expire_timestamp: timestamp,
            })
        }
        1 => {
            let offset = reader.read_i64()?;
            let metadata = reader.read_string()?;
            let commit_timestamp = reader.read_i64()?;
            let expire_timestamp = reader.read_i64()?;
            Ok(OffsetRecord {
                offset,
                metadata,
                commit_timestamp,
                expire_timestamp,
            })
        }
        2 => {
            let offset = reader.read_i64()?;
            let metadata = reader.read_string()?;
            let commit_timestamp = reader.read_i64()?;
            Ok(OffsetRecord {
                offset,
                metadata,
                commit_timestamp,
                expire_timestamp: commit_timestamp,
            })
        }
        3 => {
            let offset = reader.read_i64()?;
            let _leader_epoch = reader.read_i32()?;
            let metadata = reader.read_string()?;
            let commit_timestamp = reader.read_i64()?;
            Ok(OffsetRecord {
                offset,
                metadata,
                commit_timestamp,
                expire_timestamp: commit_timestamp,
            })
        }
        other => Err(DecodeError::UnsupportedValueVersion(other)),
    }
}

/// Parse a member assignment blob from a group describe.
///
/// The wire format is ConsumerProtocolAssignment: version i16, then an
/// i32-counted array of (topic string, i32-counted partition array).
/// Trailing user data is ignored. An empty blob means no assignment.
pub fn decode_member_assignment(assignment: &[u8]) -> Result<Vec<TopicPartition>, DecodeError> {
    if assignment.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = Reader::new(assignment);
    let _version = reader.read_i16()?;
    let topic_count = reader.read_i32()?;

    let mut partitions = Vec::new();
    for _ in 0..topic_count.max(0) {
        let topic = reader.read_string()?;
        let partition_count = reader.read_i32()?;
        for _ in 0..partition_count.max(0) {
            let partition = reader.read_i32()?;
            partitions.push(TopicPartition {
                topic: topic.clone(),
                partition,
            });
        }
    }

    Ok(partitions)
}

/// Bounds-checked big-endian reader. `bytes::Buf` panics on underflow, so
/// every read verifies `remaining()` first and surfaces truncation as a
/// `DecodeError` instead.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    /// An i16-length-prefixed UTF-8 string; length -1 encodes null, which
    /// is mapped to the empty string.
    fn read_string(&mut self) -> Result<String, DecodeError> {
        let length = self.read_i16()?;
        if length < 0 {
            return Ok(String::new());
        }
        let length = length as usize;
        if self.buf.remaining() < length {
            return Err(DecodeError::StringOverrun {
                length: length as i16,
                remaining: self.buf.remaining(),
            });
        }
        let raw = &self.buf[..length];
        let s = std::str::from_utf8(raw)
            .map_err(|e| DecodeError::InvalidString(e.to_string()))?
            .to_string();
        self.buf.advance(length);
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn put_string(buf: &mut Vec<u8>, s: &str) {
        buf.put_i16(s.len() as i16);
        buf.put_slice(s.as_bytes());
    }

    fn offset_commit_key(group: &str, topic: &str, partition: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_i16(1);
        put_string(&mut buf, group);
        put_string(&mut buf, topic);
        buf.put_i32(partition);
        buf
    }

    fn offset_value_v1(offset: i64, metadata: &str, commit_ts: i64, expire_ts: i64) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_i16(1);
        buf.put_i64(offset);
        put_string(&mut buf, metadata);
        buf.put_i64(commit_ts);
        buf.put_i64(expire_ts);
        buf
    }

    #[test]
    fn test_decode_offset_commit() {
        let key = offset_commit_key("g1", "t1", 3);
        let value = offset_value_v1(100, "meta", 1000, 2000);

        let (gtp, record) = decode(Some(key.as_slice()), Some(value.as_slice())).unwrap();
        assert_eq!(gtp, GroupTopicPartition::new("g1", "t1", 3));
        assert_eq!(record.offset, 100);
        assert_eq!(record.metadata, "meta");
        assert_eq!(record.commit_timestamp, 1000);
        assert_eq!(record.expire_timestamp, 2000);
    }

    #[test]
    fn test_decode_is_idempotent() {
        let key = offset_commit_key("g1", "t1", 0);
        let value = offset_value_v1(7, "", 10, 20);

        let first = decode(Some(key.as_slice()), Some(value.as_slice()));
        let second = decode(Some(key.as_slice()), Some(value.as_slice()));
        assert_eq!(first, second);
    }

    #[test]
    fn test_null_key_or_value_is_ignored() {
        let key = offset_commit_key("g1", "t1", 0);
        let value = offset_value_v1(7, "", 10, 20);

        assert_eq!(decode(None, Some(value.as_slice())), None);
        assert_eq!(decode(Some(key.as_slice()), None), None);
        assert_eq!(decode(None, None), None);
    }

    #[test]
    fn test_group_metadata_key_is_ignored() {
        let mut key = Vec::new();
        key.put_i16(2);
        put_string(&mut key, "g1");
        let value = offset_value_v1(7, "", 10, 20);

        assert_eq!(decode(Some(key.as_slice()), Some(value.as_slice())), None);
        assert_eq!(decode_key(&key).unwrap(), KeyKind::GroupMetadata("g1".into()));
    }

    #[test]
    fn test_unknown_key_variant_is_ignored() {
        let mut key = Vec::new();
        key.put_i16(42);
        let value = offset_value_v1(7, "", 10, 20);

        assert_eq!(decode(Some(key.as_slice()), Some(value.as_slice())), None);
        assert_eq!(decode_key(&key).unwrap(), KeyKind::Unknown(42));
    }

    #[test]
    fn test_truncated_inputs_never_panic() {
        let key = offset_commit_key("group-with-a-name", "topic", 0);
        let value = offset_value_v1(7, "some metadata", 10, 20);

        // Every prefix of a valid record decodes to None, never panics.
        for cut in 0..key.len() {
            assert_eq!(decode(Some(&key[..cut]), Some(value.as_slice())), None);
        }
        for cut in 0..value.len() {
            assert_eq!(decode(Some(key.as_slice()), Some(&value[..cut])), None);
        }
        assert_eq!(decode(Some([].as_slice()), Some([].as_slice())), None);
    }

    #[test]
    fn test_arbitrary_bytes_never_panic() {
        let junk: Vec<u8> = (0..64).map(|i| (i * 37 % 251) as u8).collect();
        for cut in 0..junk.len() {
            let _ = decode(Some(&junk[..cut]), Some(junk.as_slice()));
        }
    }

    #[test]
    fn test_value_v0_expire_falls_back_to_commit() {
        let mut value = Vec::new();
        value.put_i16(0);
        value.put_i64(55);
        put_string(&mut value, "");
        value.put_i64(999);

        let record = decode_offset_value(&value).unwrap();
        assert_eq!(record.offset, 55);
        assert_eq!(record.commit_timestamp, 999);
        assert_eq!(record.expire_timestamp, 999);
    }

    #[test]
    fn test_value_v2_has_no_expire_field() {
        let mut value = Vec::new();
        value.put_i16(2);
        value.put_i64(55);
        put_string(&mut value, "m");
        value.put_i64(777);

        let record = decode_offset_value(&value).unwrap();
        assert_eq!(record.expire_timestamp, 777);
    }

    #[test]
    fn test_value_v3_reads_leader_epoch() {
        let mut value = Vec::new();
        value.put_i16(3);
        value.put_i64(55);
        value.put_i32(12); // leader epoch, discarded
        put_string(&mut value, "m");
        value.put_i64(777);

        let record = decode_offset_value(&value).unwrap();
        assert_eq!(record.offset, 55);
        assert_eq!(record.commit_timestamp, 777);
    }

    #[test]
    fn test_unsupported_value_version() {
        let mut value = Vec::new();
        value.put_i16(9);
        value.put_i64(55);

        let err = decode_offset_value(&value).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedValueVersion(9)));
    }

    #[test]
    fn test_null_metadata_string() {
        let mut value = Vec::new();
        value.put_i16(1);
        value.put_i64(1);
        value.put_i16(-1); // null string
        value.put_i64(10);
        value.put_i64(20);

        let record = decode_offset_value(&value).unwrap();
        assert_eq!(record.metadata, "");
    }

    #[test]
    fn test_invalid_utf8_string() {
        let mut key = Vec::new();
        key.put_i16(1);
        key.put_i16(2);
        key.put_slice(&[0xff, 0xfe]);

        let err = decode_key(&key).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidString(_)));
    }

    #[test]
    fn test_member_assignment_round() {
        let mut buf = Vec::new();
        buf.put_i16(0); // assignment version
        buf.put_i32(2); // topic count
        put_string(&mut buf, "t1");
        buf.put_i32(2);
        buf.put_i32(0);
        buf.put_i32(1);
        put_string(&mut buf, "t2");
        buf.put_i32(1);
        buf.put_i32(4);
        buf.put_i32(0); // user data length

        let parsed = decode_member_assignment(&buf).unwrap();
        assert_eq!(
            parsed,
            vec![
                TopicPartition::new("t1", 0),
                TopicPartition::new("t1", 1),
                TopicPartition::new("t2", 4),
            ]
        );
    }

    #[test]
    fn test_member_assignment_empty() {
        assert_eq!(decode_member_assignment(&[]).unwrap(), Vec::new());
    }

    #[test]
    fn test_member_assignment_truncated() {
        let mut buf = Vec::new();
        buf.put_i16(0);
        buf.put_i32(1);
        put_string(&mut buf, "t1");
        buf.put_i32(3);
        buf.put_i32(0);
        // Two partitions missing.

        assert!(decode_member_assignment(&buf).is_err());
    }
}
