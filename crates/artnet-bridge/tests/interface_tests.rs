//! Interface lifecycle through the factory, driven on an in-memory stack

use artnet_bridge::params::{
    PARAM_ADDITIONAL_TARGET, PARAM_NET, PARAM_PORT_ADDRESS, PARAM_RECEIVE_UNIVERSE,
    PARAM_SEND_UNIVERSE,
};
use artnet_bridge::port::StatusSnapshot;
use artnet_bridge::{
    BridgeConfig, BridgeError, ChannelKernelSink, Direction, DirectionState, DmxInterface,
    GoodInput, GoodOutput, InterfaceFactory, KernelEvent, MemoryStack, NullKernelSink,
    ParamValue, PortAddress, PortType,
};
use crossbeam_channel::Receiver;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

fn setup(config: BridgeConfig) -> (Arc<MemoryStack>, InterfaceFactory) {
    let stack = Arc::new(MemoryStack::new());
    let factory = InterfaceFactory::with_stack(config, stack.clone());
    (stack, factory)
}

fn with_events(
    factory: &InterfaceFactory,
) -> (Arc<artnet_bridge::ArtNetInterface>, Receiver<KernelEvent>) {
    let (sink, events) = ChannelKernelSink::unbounded();
    let iface = factory.create_interface(Arc::new(sink)).unwrap();
    (iface, events)
}

#[test]
fn test_end_to_end_output() {
    let (stack, factory) = setup(BridgeConfig::default());
    let iface = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    assert_eq!(iface.port_index(), 1);

    iface.enable_output(0);
    assert!(iface
        .set_parameter(PARAM_PORT_ADDRESS, ParamValue::Text("0.0.1".into()))
        .unwrap());
    iface.send_dmx(0, &[10, 20, 30]).unwrap();

    let sent = stack.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].address, PortAddress::new(0, 0, 1).unwrap());
    assert_eq!(sent[0].offset, 0);
    assert_eq!(sent[0].data, vec![10, 20, 30]);
}

#[test]
fn test_capacity_is_exhausted_and_restored() {
    let (_stack, factory) = setup(BridgeConfig::default());
    let created: Vec<_> = (0..254)
        .map(|_| factory.create_interface(Arc::new(NullKernelSink)).unwrap())
        .collect();
    assert_eq!(created.last().unwrap().port_index(), 254);

    assert!(factory.create_interface(Arc::new(NullKernelSink)).is_none());
    assert!(factory.available_interfaces().is_empty());

    assert!(factory.dispose_interface(100));
    assert_eq!(factory.available_interfaces().len(), 1);
    let reused = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    assert_eq!(reused.port_index(), 100);
}

#[test]
fn test_lowest_free_index_first() {
    let (_stack, factory) = setup(BridgeConfig::default());
    for _ in 0..5 {
        factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    }
    factory.dispose_interface(4);
    factory.dispose_interface(2);

    let a = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    let b = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    let c = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    assert_eq!(
        (a.port_index(), b.port_index(), c.port_index()),
        (2, 4, 6)
    );
}

#[test]
fn test_frame_diff_notifies_changed_channels() {
    let (_stack, factory) = setup(BridgeConfig::default());
    let (iface, events) = with_events(&factory);
    iface.enable_input(0);
    iface
        .set_parameter(PARAM_PORT_ADDRESS, ParamValue::Int(0x0102))
        .unwrap();
    assert!(matches!(
        events.try_recv(),
        Ok(KernelEvent::PortDetailChanged { .. })
    ));

    let mut frame = [0u8; 512];
    frame[3] = 255;
    frame[200] = 7;
    let accepted = factory
        .synchronizer()
        .frame_received(PortAddress::from_raw(0x0102).unwrap(), &frame);
    assert_eq!(accepted, 1);

    let received: Vec<_> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![
            KernelEvent::DmxInputChanged {
                port: 0,
                channel: 3,
                value: 255
            },
            KernelEvent::DmxInputChanged {
                port: 0,
                channel: 200,
                value: 7
            },
        ]
    );
    assert_eq!(iface.receive_port().read().good_output, GoodOutput::DataTransmitted);
    assert_eq!(iface.read_dmx(199, 2).unwrap(), vec![0, 7]);
    assert_eq!(iface.read_dmx_byte(3).unwrap(), 255);

    // Same frame again changes nothing
    factory
        .synchronizer()
        .frame_received(PortAddress::from_raw(0x0102).unwrap(), &frame);
    assert!(events.try_recv().is_err());
}

#[test]
fn test_frame_for_other_address_is_ignored() {
    let (_stack, factory) = setup(BridgeConfig::default());
    let (iface, events) = with_events(&factory);
    iface.enable_input(0);

    let accepted = factory
        .synchronizer()
        .frame_received(PortAddress::new(1, 2, 3).unwrap(), &[9; 512]);

    assert_eq!(accepted, 0);
    assert!(events.try_recv().is_err());
    assert_eq!(iface.read_dmx(0, 512).unwrap(), vec![0; 512]);
}

#[test]
fn test_simplex_switch_passes_through_disabled() {
    let (_stack, factory) = setup(BridgeConfig::default());
    let iface = factory.create_interface(Arc::new(NullKernelSink)).unwrap();

    iface.set_direction(Direction::Input, true);
    let steps = iface.set_direction(Direction::Output, true);

    assert_eq!(
        steps,
        vec![
            StatusSnapshot {
                state: DirectionState::Disabled,
                port_type: PortType::DMX512,
                good_input: GoodInput::InputDisabled,
                good_output: GoodOutput::None,
            },
            StatusSnapshot {
                state: DirectionState::OutputEnabled,
                port_type: PortType::INPUT_TO_NETWORK,
                good_input: GoodInput::InputDisabled,
                good_output: GoodOutput::BeingOutput,
            },
        ]
    );
    assert_eq!(iface.direction_state(Direction::Input), DirectionState::OutputEnabled);
}

#[test]
fn test_additional_target() {
    let (_stack, factory) = setup(BridgeConfig::default());
    let iface = factory.create_interface(Arc::new(NullKernelSink)).unwrap();

    let err = iface
        .set_parameter(PARAM_ADDITIONAL_TARGET, ParamValue::Text("not-an-ip".into()))
        .unwrap_err();
    assert!(err.is_validation());
    assert!(iface.transmit_port().read().additional_targets.is_empty());

    iface
        .set_parameter(PARAM_ADDITIONAL_TARGET, ParamValue::Text("10.0.0.5".into()))
        .unwrap();
    iface
        .set_parameter(PARAM_ADDITIONAL_TARGET, ParamValue::Text("10.0.0.6".into()))
        .unwrap();
    let targets: Vec<IpAddr> = iface
        .transmit_port()
        .read()
        .additional_targets
        .iter()
        .copied()
        .collect();
    assert_eq!(targets, vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 6))]);

    iface
        .set_parameter(PARAM_ADDITIONAL_TARGET, ParamValue::Text(String::new()))
        .unwrap();
    assert!(iface.transmit_port().read().additional_targets.is_empty());
}

#[test]
fn test_unknown_parameter() {
    let (_stack, factory) = setup(BridgeConfig::default());
    let iface = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    assert!(matches!(
        iface.set_parameter("Bogus", ParamValue::Bool(true)),
        Err(BridgeError::UnknownParameter(_))
    ));
    assert!(iface.get_parameter("Bogus").is_none());
}

#[test]
fn test_split_duplex_addresses() {
    let (stack, factory) = setup(BridgeConfig::split_duplex());
    let (iface, events) = with_events(&factory);
    iface.on_enable();
    iface.enable_output(0);
    iface.enable_input(0);

    iface.set_parameter(PARAM_NET, ParamValue::Int(2)).unwrap();
    iface
        .set_parameter(PARAM_SEND_UNIVERSE, ParamValue::Int(4))
        .unwrap();
    iface
        .set_parameter(PARAM_RECEIVE_UNIVERSE, ParamValue::Int(5))
        .unwrap();

    assert_eq!(iface.transmit_address(), PortAddress::new(2, 0, 4).unwrap());
    assert_eq!(iface.receive_address(), PortAddress::new(2, 0, 5).unwrap());
    assert_eq!(iface.port_detail(), "Net: 2 Subnet: 0 Send: 4 Recv: 5");
    assert_eq!(events.try_iter().count(), 3);

    // Root plus both descriptors
    assert_eq!(stack.port_count(), 3);

    iface.send_dmx(10, &[1]).unwrap();
    assert_eq!(stack.take_sent()[0].address, PortAddress::new(2, 0, 4).unwrap());

    factory
        .synchronizer()
        .frame_received(PortAddress::new(2, 0, 5).unwrap(), &[0, 42]);
    assert_eq!(
        events.try_recv().unwrap(),
        KernelEvent::DmxInputChanged {
            port: 0,
            channel: 1,
            value: 42
        }
    );
}

#[test]
fn test_parameters_survive_a_restart() {
    let (_stack, factory) = setup(BridgeConfig::default());
    let iface = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    iface
        .set_parameter(PARAM_PORT_ADDRESS, ParamValue::Text("3.4.5".into()))
        .unwrap();
    iface
        .set_parameter(PARAM_ADDITIONAL_TARGET, ParamValue::Text("192.168.1.20".into()))
        .unwrap();

    let stored = serde_json::to_string(&iface.snapshot_parameters()).unwrap();
    factory.dispose_interface(iface.port_index());

    let fresh = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    let values = serde_json::from_str(&stored).unwrap();
    assert_eq!(fresh.restore_parameters(&values).unwrap(), 2);
    assert_eq!(fresh.transmit_address(), PortAddress::new(3, 4, 5).unwrap());
    assert_eq!(
        fresh.get_parameter(PARAM_ADDITIONAL_TARGET),
        Some(ParamValue::Text("192.168.1.20".into()))
    );
}

#[test]
fn test_concurrent_receive_and_read() {
    let (_stack, factory) = setup(BridgeConfig::default());
    let iface = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    iface.enable_input(0);
    let node = Arc::clone(factory.synchronizer());

    let receiver = std::thread::spawn(move || {
        for value in 0..=255u8 {
            node.frame_received(PortAddress::ROOT, &[value; 512]);
        }
    });

    for _ in 0..1000 {
        let frame = iface.read_dmx(0, 512).unwrap();
        // Frames land whole under the buffer lock
        assert!(frame.iter().all(|byte| *byte == frame[0]));
    }
    receiver.join().unwrap();
    assert_eq!(iface.read_dmx_byte(511).unwrap(), 255);
}

#[test]
fn test_kernel_dispose_returns_index_to_factory() {
    let (stack, factory) = setup(BridgeConfig::default());
    let first = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    assert_eq!(first.port_index(), 1);

    first.dispose();

    assert_eq!(factory.interface_count(), 0);
    assert_eq!(factory.remaining_capacity(), 254);
    assert!(!stack.is_registered(first.transmit_port()));

    let next = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    assert_eq!(next.port_index(), 1);
    assert_eq!(factory.remaining_capacity(), 253);
    assert_eq!(factory.interface_count(), 1);
}

#[test]
fn test_gated_sends_wait_for_batch_end() {
    let config = BridgeConfig {
        gate_output_during_send: true,
        ..Default::default()
    };
    let (stack, factory) = setup(config);
    let iface = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    iface.enable_output(0);
    let node = factory.synchronizer();

    node.before_send();
    assert!(!node.output_enabled());
    iface.send_dmx(0, &[1]).unwrap();
    iface.commit_port(0);
    assert!(stack.sent_frames().is_empty());

    node.after_send();
    let sent = stack.take_sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].data, vec![1]);
    assert_eq!(sent[1].data.len(), 512);
    assert_eq!(sent[1].data[0], 1);
}

#[test]
fn test_ungated_sends_go_straight_out() {
    let (stack, factory) = setup(BridgeConfig::default());
    let iface = factory.create_interface(Arc::new(NullKernelSink)).unwrap();
    iface.enable_output(0);

    factory.synchronizer().before_send();
    iface.send_dmx(0, &[1]).unwrap();
    assert_eq!(stack.sent_frames().len(), 1);
    factory.synchronizer().after_send();
}
