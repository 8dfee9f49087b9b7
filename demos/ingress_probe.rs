use std::time::Duration;

use mesh_harness::{
    check::{assert, require},
    curl, logging,
    request::{options, with_header, with_tls},
    retry, Config, TestCase,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let ingress_url = std::env::var("MESH_INGRESS_URL")?;
    let config = Config::from_env()?;

    TestCase::new("ingress_probe")
        .config(config)
        .run(|t| async move {
            t.log_step("Probe productpage through the ingress gateway");
            retry::until_success_with_options(
                &t,
                retry::options()
                    .max_attempts(10)
                    .delay_between_attempts(Duration::from_secs(3)),
                |t| {
                    let url = format!("{ingress_url}/productpage");
                    async move {
                        curl::request(
                            &*t,
                            &url,
                            with_header("end-user", "jason"),
                            &[
                                require::response_status(200),
                                assert::response_contains("Simple Bookstore App"),
                                assert::duration_in_range(Duration::ZERO, Duration::from_secs(5)),
                            ],
                        )
                        .await?;
                        Ok(())
                    }
                },
            )
            .await?;

            // MESH_CA_FILE=ca.crt MESH_SECURE_HOST=httpbin.example.com MESH_SECURE_INGRESS=<ip>
            if let (Ok(ca_file), Ok(host), Ok(ingress)) = (
                std::env::var("MESH_CA_FILE"),
                std::env::var("MESH_SECURE_HOST"),
                std::env::var("MESH_SECURE_INGRESS"),
            ) {
                t.log_step("Probe the TLS gateway");
                curl::request(
                    &*t,
                    &format!("https://{host}:443/status/418"),
                    options().with(with_tls(ca_file, host.as_str(), ingress, 443)),
                    &[assert::response_status(418)],
                )
                .await?;
            }
            Ok(())
        })
        .await?;

    Ok(())
}
