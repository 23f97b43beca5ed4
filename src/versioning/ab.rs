//! Experiment bucketing.

use sha2::{Digest, Sha256};

use crate::types::{AbTest, Arm};

/// Stable bucket in `0..100` for an identified user.
///
/// Derived from SHA-256 rather than `DefaultHasher`, so every worker in a
/// fleet (and every restart) puts a user in the same bucket.
pub fn user_bucket(user_id: &str) -> u8 {
    let digest = Sha256::digest(user_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % 100) as u8
}

/// Per-call uniform draw in `0..100` for anonymous traffic. Not sticky.
pub fn random_bucket() -> u8 {
    rand::random_range(0..100)
}

/// Bucket for `user_id`, or a fresh random draw when absent.
pub fn bucket_for(user_id: Option<&str>) -> u8 {
    user_id.map_or_else(random_bucket, user_bucket)
}

/// Arm of `test` that `bucket` falls in.
pub fn assign(test: &AbTest, bucket: u8) -> Arm {
    if bucket < test.split.test {
        Arm::Test
    } else {
        Arm::Control
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AbTestStatus, TrafficSplit};

    fn test_with_split(test: u8) -> AbTest {
        AbTest {
            test_id: "t".into(),
            model_family: "claude".into(),
            status: AbTestStatus::Active,
            split: TrafficSplit {
                control: 100 - test,
                test,
            },
            test_version_id: "v-test".into(),
        }
    }

    #[test]
    fn user_bucket_is_stable_and_in_range() {
        let first = user_bucket("user-42");
        for _ in 0..1_000 {
            assert_eq!(user_bucket("user-42"), first);
        }
        assert!(first < 100);
    }

    #[test]
    fn user_buckets_spread_across_range() {
        let test_arm = (0..1_000)
            .filter(|i| user_bucket(&format!("user-{i}")) < 50)
            .count();
        assert!((350..650).contains(&test_arm), "got {test_arm}");
    }

    #[test]
    fn random_bucket_is_in_range() {
        for _ in 0..1_000 {
            assert!(random_bucket() < 100);
        }
    }

    #[test]
    fn split_boundaries() {
        assert_eq!(assign(&test_with_split(0), 0), Arm::Control);
        assert_eq!(assign(&test_with_split(100), 99), Arm::Test);
        assert_eq!(assign(&test_with_split(30), 29), Arm::Test);
        assert_eq!(assign(&test_with_split(30), 30), Arm::Control);
    }
}
