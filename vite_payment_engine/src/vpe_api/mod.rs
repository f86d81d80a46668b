pub mod order_flow_api;
