use portrisk::ports::{parse_ports_str, range_ports, ScanProfile};
use portrisk::ScanError;

#[test]
fn parse_single_and_ranges_and_comments() {
    let input = r#"
        # common ports
        22
        80  # http
        443 # https
        8000-8002
        8001  # duplicate
        # blank line follows

    "#;

    let ports = parse_ports_str(input).expect("parse ok");
    // Dedup, preserve insertion order of first appearance in each range/line
    assert_eq!(ports, vec![22, 80, 443, 8000, 8001, 8002]);
}

#[test]
fn invalid_port_rejected() {
    let input = "0\n"; // invalid: out of range
    assert!(parse_ports_str(input).is_err());
}

#[test]
fn reversed_range_profile_is_invalid_range() {
    let err = ScanProfile::Range { start: 10, end: 5 }.ports().unwrap_err();
    assert!(matches!(err, ScanError::InvalidRange { start: 10, end: 5 }));
    assert!(range_ports(5, 10).is_ok());
}

#[test]
fn single_profile_is_one_port() {
    assert_eq!(ScanProfile::Single(8443).ports().unwrap(), vec![8443]);
}
