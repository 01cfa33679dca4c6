#![no_main]

use libfuzzer_sys::fuzz_target;

use domain::flow::desc::FlowConditionDesc;
use domain::flow::condition::FlowCondition;

// Arbitrary JSON descriptors must either be rejected with an error or
// produce a condition whose descriptor rebuilds an equal condition.
fuzz_target!(|data: &[u8]| {
    let Ok(desc) = serde_json::from_slice::<FlowConditionDesc>(data) else {
        return;
    };
    let Ok(cond) = FlowCondition::create(&desc) else {
        return;
    };

    let rebuilt = FlowCondition::create(&cond.to_desc()).expect("descriptor of a valid condition");
    assert_eq!(rebuilt, cond);
    assert_eq!(rebuilt.to_string(), cond.to_string());
});
