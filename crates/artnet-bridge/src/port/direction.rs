//! Port direction state machine
//!
//! Directions are named from the kernel's side: `OutputEnabled` means the
//! kernel sends DMX into the network (the descriptor is an Art-Net input),
//! `InputEnabled` means the kernel receives DMX from the network.
//!
//! ```text
//!            enable_input              enable_output
//!  InputEnabled <------- Disabled -------> OutputEnabled
//!        |                  ^                    |
//!        +---- disable -----+----- disable ------+
//! ```
//!
//! A simplex port is exclusive: switching straight from one active direction
//! to the other passes through `Disabled` first. Duplex ports give each
//! direction its own descriptor and machine, so no exclusion applies.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::descriptor::{GoodInput, GoodOutput, PortDescriptor, PortType};

/// Direction a logical port is currently enabled for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectionState {
    #[default]
    Disabled,
    InputEnabled,
    OutputEnabled,
}

/// Descriptor status observed after one step of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: DirectionState,
    pub port_type: PortType,
    pub good_input: GoodInput,
    pub good_output: GoodOutput,
}

impl StatusSnapshot {
    fn capture(state: DirectionState, descriptor: &PortDescriptor) -> Self {
        Self {
            state,
            port_type: descriptor.port_type,
            good_input: descriptor.good_input,
            good_output: descriptor.good_output,
        }
    }
}

/// Tracks the direction of one port descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionMachine {
    state: DirectionState,
    exclusive: bool,
}

impl DirectionMachine {
    /// Machine for a simplex port (input and output mutually exclusive)
    pub fn exclusive() -> Self {
        Self {
            state: DirectionState::Disabled,
            exclusive: true,
        }
    }

    /// Machine for one direction of a duplex port
    pub fn independent() -> Self {
        Self {
            state: DirectionState::Disabled,
            exclusive: false,
        }
    }

    pub fn state(&self) -> DirectionState {
        self.state
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Move to `target`, updating the descriptor's flags on every step
    ///
    /// Returns one snapshot per state entered; empty when `target` is the
    /// current state.
    pub fn enter(
        &mut self,
        target: DirectionState,
        descriptor: &mut PortDescriptor,
    ) -> Vec<StatusSnapshot> {
        if target == self.state {
            return Vec::new();
        }

        let mut steps = Vec::with_capacity(2);

        if self.exclusive
            && self.state != DirectionState::Disabled
            && target != DirectionState::Disabled
        {
            self.apply(DirectionState::Disabled, descriptor);
            steps.push(StatusSnapshot::capture(self.state, descriptor));
        }

        self.apply(target, descriptor);
        steps.push(StatusSnapshot::capture(self.state, descriptor));
        steps
    }

    /// Leave `active` for `Disabled`; a no-op when another direction is active
    pub fn leave(
        &mut self,
        active: DirectionState,
        descriptor: &mut PortDescriptor,
    ) -> Vec<StatusSnapshot> {
        if self.state != active {
            return Vec::new();
        }
        self.enter(DirectionState::Disabled, descriptor)
    }

    /// Write the flags of the current state again
    pub fn reapply(&self, descriptor: &mut PortDescriptor) {
        write_flags(self.state, descriptor);
    }

    /// Neutral flags while the whole interface is disabled; the state is kept
    pub fn suspend(&self, descriptor: &mut PortDescriptor) {
        descriptor.port_type = PortType::DMX512;
        descriptor.good_input = GoodInput::None;
        descriptor.good_output = GoodOutput::None;
    }

    /// The kernel committed a write cycle on this port
    pub fn record_commit(&self, descriptor: &mut PortDescriptor) -> bool {
        if self.state != DirectionState::OutputEnabled {
            return false;
        }
        descriptor.good_input = GoodInput::DataReceived;
        true
    }

    fn apply(&mut self, state: DirectionState, descriptor: &mut PortDescriptor) {
        debug!(
            "Port {}: {:?} -> {:?}",
            descriptor.port_number, self.state, state
        );
        self.state = state;
        write_flags(state, descriptor);
    }
}

fn write_flags(state: DirectionState, descriptor: &mut PortDescriptor) {
    match state {
        DirectionState::Disabled => {
            descriptor.port_type = PortType::DMX512;
            descriptor.good_input = GoodInput::InputDisabled;
            descriptor.good_output = GoodOutput::None;
        }
        DirectionState::InputEnabled => {
            descriptor.port_type = PortType::OUTPUT_FROM_NETWORK;
            // Nothing flows towards the network; GoodOutput flips once the
            // first frame arrives.
            descriptor.good_input = GoodInput::InputDisabled;
            descriptor.good_output = GoodOutput::None;
        }
        DirectionState::OutputEnabled => {
            descriptor.port_type = PortType::INPUT_TO_NETWORK;
            // Stays disabled until the kernel commits its first cycle
            descriptor.good_input = GoodInput::InputDisabled;
            descriptor.good_output = GoodOutput::BeingOutput;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::PortAddress;

    fn descriptor() -> PortDescriptor {
        PortDescriptor::new(1, PortAddress::ROOT, PortType::DMX512)
    }

    #[test]
    fn test_enable_output_from_disabled() {
        let mut machine = DirectionMachine::exclusive();
        let mut port = descriptor();

        let steps = machine.enter(DirectionState::OutputEnabled, &mut port);

        assert_eq!(steps.len(), 1);
        assert_eq!(machine.state(), DirectionState::OutputEnabled);
        assert_eq!(port.port_type, PortType::INPUT_TO_NETWORK);
        assert_eq!(port.good_input, GoodInput::InputDisabled);
        assert_eq!(port.good_output, GoodOutput::BeingOutput);
    }

    #[test]
    fn test_exclusive_switch_passes_through_disabled() {
        let mut machine = DirectionMachine::exclusive();
        let mut port = descriptor();
        machine.enter(DirectionState::InputEnabled, &mut port);
        assert_eq!(port.port_type, PortType::OUTPUT_FROM_NETWORK);

        let steps = machine.enter(DirectionState::OutputEnabled, &mut port);

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].state, DirectionState::Disabled);
        assert_eq!(steps[0].port_type, PortType::DMX512);
        assert_eq!(steps[0].good_input, GoodInput::InputDisabled);
        assert_eq!(steps[0].good_output, GoodOutput::None);
        assert_eq!(steps[1].state, DirectionState::OutputEnabled);
        assert_eq!(steps[1].good_output, GoodOutput::BeingOutput);
    }

    #[test]
    fn test_independent_switch_is_direct() {
        let mut machine = DirectionMachine::independent();
        let mut port = descriptor();
        machine.enter(DirectionState::InputEnabled, &mut port);

        let steps = machine.enter(DirectionState::OutputEnabled, &mut port);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].state, DirectionState::OutputEnabled);
    }

    #[test]
    fn test_same_state_is_noop() {
        let mut machine = DirectionMachine::exclusive();
        let mut port = descriptor();
        assert!(machine.enter(DirectionState::Disabled, &mut port).is_empty());
        assert_eq!(port.good_input, GoodInput::None);
    }

    #[test]
    fn test_leave_only_active_direction() {
        let mut machine = DirectionMachine::exclusive();
        let mut port = descriptor();
        machine.enter(DirectionState::InputEnabled, &mut port);

        assert!(machine
            .leave(DirectionState::OutputEnabled, &mut port)
            .is_empty());
        assert_eq!(machine.state(), DirectionState::InputEnabled);

        let steps = machine.leave(DirectionState::InputEnabled, &mut port);
        assert_eq!(steps.len(), 1);
        assert_eq!(machine.state(), DirectionState::Disabled);
    }

    #[test]
    fn test_commit_marks_data_received() {
        let mut machine = DirectionMachine::exclusive();
        let mut port = descriptor();

        assert!(!machine.record_commit(&mut port));

        machine.enter(DirectionState::OutputEnabled, &mut port);
        assert!(machine.record_commit(&mut port));
        assert_eq!(port.good_input, GoodInput::DataReceived);
    }

    #[test]
    fn test_suspend_keeps_state() {
        let mut machine = DirectionMachine::exclusive();
        let mut port = descriptor();
        machine.enter(DirectionState::OutputEnabled, &mut port);

        machine.suspend(&mut port);
        assert_eq!(port.port_type, PortType::DMX512);
        assert_eq!(machine.state(), DirectionState::OutputEnabled);

        machine.reapply(&mut port);
        assert_eq!(port.port_type, PortType::INPUT_TO_NETWORK);
    }
}
