// meridian/core/verifier/src/info.rs

use crate::config::Mode;
use crate::error::VerifyError;
use serde::{Deserialize, Serialize};

/// Generation metadata recorded in the block head. Verification rebuilds
/// batch boundaries from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub mode: u8,
    #[serde(default)]
    pub thread: usize,
    #[serde(default)]
    pub batch: Vec<usize>,
}

impl Info {
    pub fn serial() -> Self {
        Self {
            mode: Mode::Serial.code(),
            ..Self::default()
        }
    }

    pub fn batched(thread: usize, batch: Vec<usize>) -> Self {
        Self {
            mode: Mode::Batch.code(),
            thread,
            batch,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, VerifyError> {
        serde_json::to_vec(self).map_err(|e| VerifyError::Info(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, VerifyError> {
        serde_json::from_slice(bytes).map_err(|e| VerifyError::Info(e.to_string()))
    }

    /// `[start, end)` ranges of each recorded batch, checked against the
    /// number of transactions in the block and the recorded width.
    pub fn batch_ranges(&self, txs: usize) -> Result<Vec<(usize, usize)>, VerifyError> {
        if let Some(&size) = self.batch.iter().find(|&&size| size > self.thread) {
            return Err(VerifyError::BatchOversized {
                size,
                thread: self.thread,
            });
        }
        let sum: usize = self.batch.iter().sum();
        if sum != txs {
            return Err(VerifyError::BatchMismatch { sum, txs });
        }
        let mut start = 0;
        Ok(self
            .batch
            .iter()
            .map(|size| {
                let range = (start, start + size);
                start += size;
                range
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let info = Info::batched(4, vec![3, 2]);
        let bytes = info.encode().unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            r#"{"mode":1,"thread":4,"batch":[3,2]}"#
        );
        assert_eq!(Info::decode(&bytes).unwrap(), info);
        assert_eq!(Info::decode(br#"{"mode":0}"#).unwrap(), Info::serial());
    }

    #[test]
    fn test_undecodable() {
        assert!(matches!(Info::decode(b""), Err(VerifyError::Info(_))));
        assert!(matches!(Info::decode(b"[1]"), Err(VerifyError::Info(_))));
    }

    #[test]
    fn test_batch_ranges() {
        let info = Info::batched(4, vec![4, 4, 2]);
        assert_eq!(
            info.batch_ranges(10).unwrap(),
            vec![(0, 4), (4, 8), (8, 10)]
        );
        assert!(matches!(
            info.batch_ranges(9),
            Err(VerifyError::BatchMismatch { sum: 10, txs: 9 })
        ));
        assert!(Info::batched(2, vec![]).batch_ranges(0).unwrap().is_empty());
    }

    #[test]
    fn test_batches_wider_than_thread() {
        assert!(matches!(
            Info::batched(1, vec![10]).batch_ranges(10),
            Err(VerifyError::BatchOversized { size: 10, thread: 1 })
        ));
        assert!(matches!(
            Info::batched(0, vec![1]).batch_ranges(1),
            Err(VerifyError::BatchOversized { size: 1, thread: 0 })
        ));
        assert!(Info::batched(0, vec![]).batch_ranges(0).is_ok());
        assert_eq!(Info::batched(1, vec![1, 1]).batch_ranges(2).unwrap().len(), 2);
    }
}
