//! Admission control properties.

use proptest::prelude::*;
use scan_governor::{GovernorConfig, ResourceGovernor, ResourceQuota, ResourceRequest};

fn request() -> impl Strategy<Value = ResourceRequest> {
    (0u64..400, 0u64..400, 0u64..400, 0u64..3).prop_map(|(m, s, b, t)| {
        ResourceRequest::new().memory(m).storage(s).bandwidth(b).tasks(t)
    })
}

proptest! {
    #[test]
    fn counters_never_exceed_quota(requests in prop::collection::vec((request(), any::<bool>()), 1..60)) {
        let quota = ResourceQuota {
            memory_bytes: 1000,
            storage_bytes: 1000,
            bandwidth_bytes: 1000,
            concurrent_tasks: 4,
        };
        let gov = ResourceGovernor::new(GovernorConfig::default().with_quota(quota));
        let mut held = Vec::new();

        for (req, keep) in requests {
            let before = gov.usage();
            match gov.try_acquire(req) {
                Ok(lease) => {
                    if keep {
                        held.push(lease);
                    }
                }
                Err(_) => {
                    prop_assert_eq!(gov.usage(), before);
                }
            }
            let usage = gov.usage();
            prop_assert!(usage.memory <= quota.memory_bytes);
            prop_assert!(usage.storage <= quota.storage_bytes);
            prop_assert!(usage.bandwidth <= quota.bandwidth_bytes);
            prop_assert!(usage.tasks <= quota.concurrent_tasks);
        }

        drop(held);
        prop_assert_eq!(gov.usage().memory, 0);
        prop_assert_eq!(gov.usage().tasks, 0);
    }
}
