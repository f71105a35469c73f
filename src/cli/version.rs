use govledger::chain::DEFAULT_VERSION_TAG;

/// Display version information
pub fn execute() {
    println!("govledger {}", env!("CARGO_PKG_VERSION"));
    println!("Governance ledger built from decoded DAO contract events");
    println!("Default contract generation: {}", DEFAULT_VERSION_TAG);
}
