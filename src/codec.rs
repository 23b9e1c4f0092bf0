//! Pluggable serialization for persisted approval records.

use anyhow::Context;

use crate::models::approval::Approval;

pub trait Codec: Send + Sync {
    fn encode(&self, approval: &Approval) -> anyhow::Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<Approval>;
}

/// Default codec: compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, approval: &Approval) -> anyhow::Result<Vec<u8>> {
        serde_json::to_vec(approval).context("failed to encode approval")
    }

    fn decode(&self, bytes: &[u8]) -> anyhow::Result<Approval> {
        serde_json::from_slice(bytes).context("failed to decode approval")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::approval::{Event, Repository};

    #[test]
    fn test_json_codec_preserves_votes() {
        let mut approval = Approval::new(
            "p/r:1.2.3",
            "1.2.2",
            "1.2.3",
            3,
            Event::new(Repository::default(), "poll"),
        );
        approval.votes_received = 2;
        approval.voters.insert("U1".into());
        approval.voters.insert("U2".into());

        let codec = JsonCodec;
        let bytes = codec.encode(&approval).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, approval);
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        assert!(JsonCodec.decode(b"not json").is_err());
    }
}
