mod test_transport_loss;
mod test_unreachable_peer_is_isolated;
