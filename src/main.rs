use scanpay_gateway::{GatewayFactory, GatewayService};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Reports which providers the current environment can serve and, when asked,
/// the processor-side status of an order:
///
/// `scanpay-gateway [query <provider> <order_no>]`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let service = GatewayService::new(Arc::new(GatewayFactory::from_env()));
    let args: Vec<String> = std::env::args().skip(1).collect();

    let response = match args.as_slice() {
        [] => service.get_supported_payments(),
        [cmd, provider, order_no] if cmd == "query" => {
            service.query_payment(provider, order_no).await
        }
        _ => anyhow::bail!("usage: scanpay-gateway [query <provider> <order_no>]"),
    };

    tracing::info!(success = response.success, "done");
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
