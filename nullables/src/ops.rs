//! Builders for raw ledger operations and posts used across test suites.

use paysnap_chain::{Beneficiary, PostContent};
use paysnap_types::{AccountName, OperationBody, RawOperation};

pub fn transfer(
    block: u64,
    trx_id: &str,
    from: &str,
    to: &str,
    amount: &str,
    memo: &str,
) -> RawOperation {
    RawOperation {
        block,
        trx_id: trx_id.to_string(),
        body: OperationBody::Transfer {
            from: AccountName::new(from),
            to: AccountName::new(to),
            amount: amount.to_string(),
            memo: memo.to_string(),
        },
    }
}

pub fn comment(
    block: u64,
    trx_id: &str,
    author: &str,
    parent_author: &str,
    permlink: &str,
) -> RawOperation {
    RawOperation {
        block,
        trx_id: trx_id.to_string(),
        body: OperationBody::Comment {
            author: AccountName::new(author),
            parent_author: parent_author.to_string(),
            permlink: permlink.to_string(),
        },
    }
}

/// A virtual operation; every real block carries at least one.
pub fn producer_reward(block: u64) -> RawOperation {
    RawOperation {
        block,
        trx_id: "0000000000000000000000000000000000000000".to_string(),
        body: OperationBody::Other {
            kind: "producer_reward".to_string(),
        },
    }
}

pub fn post(
    author: &str,
    permlink: &str,
    parent_author: &str,
    beneficiaries: &[(&str, u32)],
) -> PostContent {
    PostContent {
        author: author.to_string(),
        permlink: permlink.to_string(),
        parent_author: parent_author.to_string(),
        beneficiaries: beneficiaries
            .iter()
            .map(|(account, weight)| Beneficiary {
                account: account.to_string(),
                weight: *weight,
            })
            .collect(),
    }
}
