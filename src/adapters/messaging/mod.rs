pub mod http_messaging;
