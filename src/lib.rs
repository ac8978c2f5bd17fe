pub mod config;
pub mod domain {
    pub mod error;
    pub mod order;
    pub mod result;
}
pub mod gateways;
pub mod service {
    pub mod factory;
    pub mod payment_service;
}
pub mod validator;

pub use config::{ConfigSource, EnvConfigSource, ProviderConfig, StaticConfigSource};
pub use domain::error::{ErrorCode, GatewayError};
pub use domain::order::{OrderData, RefundData};
pub use domain::result::{GatewayResponse, PaymentResult, TradeStatus};
pub use gateways::{PaymentProvider, Provider};
pub use service::factory::GatewayFactory;
pub use service::payment_service::GatewayService;
