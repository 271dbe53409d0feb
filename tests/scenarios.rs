//! End-to-end scenarios exercising the router and evaluator together
//! against small hand-built device/netlist files.

use nisp_router::device::Device;
use nisp_router::evaluator;
use nisp_router::netlist::Netlist;
use nisp_router::routing::Router;
use nisp_router::serialize;

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("nisp_router_scenario_{name}_{}", std::process::id()))
}

fn write_device(name: &str, text: &str) -> std::path::PathBuf {
    let path = temp_path(name);
    std::fs::write(&path, text).unwrap();
    path
}

/// 0 --> 1 --> 2, a trivial three-node chain.
fn chain_device_text() -> &'static str {
    "3\n\
     0 LOCAL 0 0 0 0 0\n\
     1 LOCAL 1 1 0 1 0\n\
     2 PINFEED 0 2 0 2 0\n\
     \n\
     0 1\n\
     1 2\n\
     2\n"
}

#[test]
fn trivial_chain_routes_through_intermediate_node() {
    let device_path = write_device("chain_device", chain_device_text());
    let netlist_path = write_device("chain_netlist", "0 n0 0 2\n");
    let output_path = temp_path("chain_output");

    let mut device = Device::load(&device_path).unwrap();
    let mut netlist = Netlist::load_for_router(&netlist_path, &mut device).unwrap();
    Router::new(&device, &mut netlist).route();
    serialize::write_result(&output_path, &netlist).unwrap();

    assert!(netlist.connections[0].routed);
    assert_eq!(netlist.connections[0].path, vec![2, 1, 0]);
    assert!(netlist.nets[0].pips.contains(&nisp_router::netlist::Pip { parent: 0, child: 1 }));
    assert!(netlist.nets[0].pips.contains(&nisp_router::netlist::Pip { parent: 1, child: 2 }));

    let mut eval_netlist = Netlist::load_for_evaluator(&write_device("chain_eval_netlist", "1\n0 n0 0 2\n"), &mut device).unwrap();
    let report = evaluator::evaluate(&device, &mut eval_netlist, &output_path, true).unwrap();
    assert_eq!(report.num_congested_nodes, 0);
    assert_eq!(report.num_successfully_routed_nets, 1);
    assert_eq!(report.total_wirelength, 1);

    for p in [device_path, netlist_path, output_path] {
        std::fs::remove_file(p).ok();
    }
}

#[test]
fn direct_source_to_sink_skips_intermediate() {
    let text = "3\n\
        0 LOCAL 0 0 0 0 0\n\
        1 LOCAL 1 1 0 1 0\n\
        2 PINFEED 0 2 0 2 0\n\
        \n\
        0 2\n\
        1 2\n\
        2\n";
    let device_path = write_device("direct_device", text);
    let netlist_path = write_device("direct_netlist", "0 n0 0 2\n");

    let mut device = Device::load(&device_path).unwrap();
    let mut netlist = Netlist::load_for_router(&netlist_path, &mut device).unwrap();
    Router::new(&device, &mut netlist).route();

    assert!(netlist.connections[0].routed);
    assert_eq!(netlist.connections[0].path, vec![2, 0]);
    assert!(netlist.nets[0].pips.contains(&nisp_router::netlist::Pip { parent: 0, child: 2 }));

    for p in [device_path, netlist_path] {
        std::fs::remove_file(p).ok();
    }
}

#[test]
fn unreachable_sink_fails_to_route_and_evaluator_agrees() {
    let text = "3\n\
        0 LOCAL 0 0 0 0 0\n\
        1 LOCAL 1 1 0 1 0\n\
        2 PINFEED 0 2 0 2 0\n\
        \n\
        0 1\n\
        1\n\
        2\n";
    let device_path = write_device("unreachable_device", text);
    let netlist_path = write_device("unreachable_netlist", "0 n0 0 2\n");
    let output_path = temp_path("unreachable_output");

    let mut device = Device::load(&device_path).unwrap();
    let mut netlist = Netlist::load_for_router(&netlist_path, &mut device).unwrap();
    Router::new(&device, &mut netlist).route();
    serialize::write_result(&output_path, &netlist).unwrap();

    assert!(!netlist.connections[0].routed);

    let mut eval_netlist = Netlist::load_for_evaluator(&write_device("unreachable_eval_netlist", "1\n0 n0 0 2\n"), &mut device).unwrap();
    let report = evaluator::evaluate(&device, &mut eval_netlist, &output_path, false).unwrap();
    assert_eq!(report.num_successfully_routed_nets, 0);

    for p in [device_path, netlist_path, output_path] {
        std::fs::remove_file(p).ok();
    }
}

/// Two nets share intermediate node 1: net A is 0->1->2, net B is 3->1->4.
#[test]
fn contended_intermediate_node_reports_persistent_congestion() {
    let text = "5\n\
        0 LOCAL 0 0 0 0 0\n\
        1 LOCAL 1 1 0 1 0\n\
        2 PINFEED 0 2 0 2 0\n\
        3 LOCAL 0 3 0 3 0\n\
        4 PINFEED 0 4 0 4 0\n\
        \n\
        0 1\n\
        1 2 4\n\
        2\n\
        3 1\n\
        4\n";
    let device_path = write_device("contend_device", text);
    let netlist_path = write_device("contend_netlist", "0 nA 0 2\n1 nB 3 4\n");

    let mut device = Device::load(&device_path).unwrap();
    let mut netlist = Netlist::load_for_router(&netlist_path, &mut device).unwrap();
    let state = Router::new(&device, &mut netlist).route();

    // Node 1 cannot be avoided by either net, so it stays congested and
    // the router exhausts its iteration budget without converging.
    assert!(state.nodes[1].is_congested());

    for p in [device_path, netlist_path] {
        std::fs::remove_file(p).ok();
    }
}

/// An HQUAD node with length 0 is inaccessible and must be treated as
/// absent by the search even though it has an outgoing edge.
#[test]
fn zero_length_hquad_node_is_unreachable() {
    let text = "3\n\
        0 LOCAL 0 0 0 0 0\n\
        1 HQUAD 0 1 0 1 0\n\
        2 PINFEED 0 2 0 2 0\n\
        \n\
        0 1\n\
        1 2\n\
        2\n";
    let device_path = write_device("hquad_device", text);
    let netlist_path = write_device("hquad_netlist", "0 n0 0 2\n");

    let mut device = Device::load(&device_path).unwrap();
    assert!(!device.nodes[1].accessible);

    // The only path from source to sink runs through the inaccessible
    // node, so the search must treat it as absent and the connection
    // must fail to route.
    let mut netlist = Netlist::load_for_router(&netlist_path, &mut device).unwrap();
    Router::new(&device, &mut netlist).route();
    assert!(!netlist.connections[0].routed);

    for p in [device_path, netlist_path] {
        std::fs::remove_file(p).ok();
    }
}
