use wallet_approval_lib::config::Config;

pub const TEST_EVM_SPENDER: &str = "0x2f3a2a2466ab24eb95ab19dbcb44ce0a00ea4be8";
pub const TEST_TRON_SPENDER: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

pub fn create_test_config() -> Config {
    create_test_config_with_advisory("http://127.0.0.1:8000")
}

pub fn create_test_config_with_advisory(advisory_base_url: &str) -> Config {
    create_test_config_custom(advisory_base_url, None)
}

pub fn create_test_config_custom(
    advisory_base_url: &str,
    tron_allowed_tokens: Option<&[&str]>,
) -> Config {
    let allowed_tokens_line = match tron_allowed_tokens {
        Some(tokens) => {
            let quoted: Vec<String> = tokens.iter().map(|token| format!("\"{token}\"")).collect();
            format!("allowed-tokens = [{}]\n", quoted.join(", "))
        }
        None => String::new(),
    };
    Config::load_from_str(&format!(
        r#"
[chain.mainnet]
chain-name = "Ethereum"
chain-id = 1
family = "evm"
spender-address = "{TEST_EVM_SPENDER}"
approval-amount = "1000000000000000000"

[chain.tron]
chain-name = "Tron"
chain-id = 728126428
family = "tron"
spender-address = "{TEST_TRON_SPENDER}"
approval-amount = "1000000"
{allowed_tokens_line}
[engine]
readiness-poll-interval = 5
readiness-probe-attempts = 3
readiness-probe-delay-ms = 500
connect-max-attempts = 3
connect-retry-delay-ms = 1000
settle-delay-ms = 500
status-check-attempts = 3
status-check-delay-ms = 1000

[advisory]
base-url = "{advisory_base_url}"
request-timeout = 10

[relay]
project-id = "test-project-id"
relay-url = "wss://relay.invalid"
app-name = "Approval Processor Tests"
app-description = "Token approval engine test fixture"
app-url = "https://example.invalid"
"#
    ))
    .unwrap()
}
