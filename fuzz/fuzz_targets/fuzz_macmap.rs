#![no_main]

use std::collections::BTreeSet;

use libfuzzer_sys::fuzz_target;

use domain::common::entity::MacAddr;
use domain::macmap::entity::{MacMapRef, MacVlan, NodeFilter, PortVlan, SwitchPort};
use domain::macmap::state::MacMapState;

// Each 4-byte chunk is one operation:
//   [0] opcode, [1] MAC low byte, [2] VLAN (mod 4), [3] node/port selector
// After every step the network table must be exactly the set of
// port/VLAN pairs of the active hosts.
fuzz_target!(|data: &[u8]| {
    let map = MacMapRef::new("fuzz", "b0");
    let mut state = MacMapState::new();

    for chunk in data.chunks_exact(4) {
        let mac = MacAddr([0x02, 0, 0, 0, 0, chunk[1] % 16]);
        let Ok(host) = MacVlan::new(mac, u16::from(chunk[2] % 4)) else {
            continue;
        };
        let port = SwitchPort::new(u64::from(chunk[3] >> 4), u32::from(chunk[3] & 0x0f));
        let mut released = BTreeSet::new();

        match chunk[0] % 5 {
            0 | 1 => {
                let before = state.clone();
                if state.activate(&map, host, port).is_err() {
                    assert_eq!(state, before);
                }
            }
            2 => {
                state.inactivate(host, &mut released);
            }
            3 => {
                state.inactivate_network(&PortVlan::new(port, host.vlan()));
            }
            _ => {
                state.inactivate_ports(&NodeFilter(port.node), &mut released);
            }
        }

        let hosts = state.active_hosts().unwrap_or_default();
        let expected: BTreeSet<PortVlan> = hosts
            .iter()
            .map(|(h, p)| PortVlan::new(*p, h.vlan()))
            .collect();
        assert_eq!(state.networks().unwrap_or_default(), expected);
        assert!(released.iter().all(|n| !state.has_network(n)));
        state.take_dirty();
    }
});
