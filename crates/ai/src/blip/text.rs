/// `[DEC]`, the token BLIP's text decoder starts every caption with.
pub const BOS_TOKEN_ID: u32 = 30522;
/// `[SEP]`, end of caption.
pub const SEP_TOKEN_ID: u32 = 102;

const CONTROL_TOKENS: [&str; 7] = ["[CLS]", "[SEP]", "[PAD]", "[MASK]", "[UNK]", "[DEC]", "[ENC]"];

/// Remove control tokens the tokenizer left in the decoded text and collapse whitespace.
pub fn clean_caption(decoded: &str) -> String {
    let mut text = decoded.to_string();
    for token in CONTROL_TOKENS {
        text = text.replace(token, " ");
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
