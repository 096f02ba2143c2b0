mod advisory_stub;
mod config_setup;

pub use advisory_stub::{spawn_advisory_stub, AdvisoryStub};
pub use config_setup::{
    create_test_config, create_test_config_custom, create_test_config_with_advisory,
    TEST_EVM_SPENDER, TEST_TRON_SPENDER,
};
