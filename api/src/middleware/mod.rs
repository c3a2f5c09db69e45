pub mod access_gate;
pub mod cors;
pub mod ip_allowlist;
pub mod rate_limit;
pub mod request_id;
