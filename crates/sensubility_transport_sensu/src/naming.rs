//! Pure naming helpers for the per-client exchange/queue topology
//! (spec.md §4.3), split out so they're testable without a broker.

pub fn exchange_name(client_name: &str) -> String {
    format!("client:{client_name}")
}

pub fn queue_name(client_name: &str, startup_epoch: i64) -> String {
    format!("{client_name}-collectd-{startup_epoch}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_name_is_reserved_for_direct_to_client_messages() {
        assert_eq!(exchange_name("host1"), "client:host1");
    }

    #[test]
    fn queue_name_is_unique_per_process_lifetime() {
        assert_eq!(queue_name("host1", 1700000000), "host1-collectd-1700000000");
        assert_ne!(queue_name("host1", 1), queue_name("host1", 2));
    }
}
