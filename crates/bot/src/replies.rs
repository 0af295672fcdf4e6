//! Texts sent back to chat.

pub const REGISTRATION_PROMPT: &str =
    ":question: Please register your Ethereum address:\n\n> @tiperc20 register YOUR_ADDRESS";

pub fn tip_sent(transaction_hash: &str) -> String {
    format!(":+1: You got a token at {transaction_hash}")
}

pub fn registered(address: &str) -> String {
    format!(":o: Registered `{address}`")
}

pub fn failure(reason: &str) -> String {
    format!(":x: {reason}")
}

pub fn unknown_command(verb: &str) -> String {
    format!(":x: Unknown command `{verb}`. Try `tip @someone` or `register YOUR_ADDRESS`.")
}
