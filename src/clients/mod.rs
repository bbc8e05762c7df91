pub mod led_1224_client;
