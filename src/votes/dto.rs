use serde::{Deserialize, Serialize};

/// `dir` on the wire: 1 casts a vote, 0 retracts it. Nothing else is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum VoteDir {
    Retract,
    Cast,
}

impl TryFrom<i64> for VoteDir {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(VoteDir::Retract),
            1 => Ok(VoteDir::Cast),
            other => Err(format!("dir must be 0 or 1, got {}", other)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub post_id: i32,
    pub dir: VoteDir,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub message: String,
}
