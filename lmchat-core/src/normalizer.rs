use crate::model::{ChatMessage, RelayRequest};
use unicode_normalization::UnicodeNormalization;

fn clean_text(s: &str) -> String {
    // Unicode NFC normalization + BOM strip + CRLF -> LF. No trimming:
    // leading/trailing whitespace can matter in a chat turn.
    let mut t = s.nfc().collect::<String>();
    if t.starts_with('\u{FEFF}') {
        t.remove(0);
    }
    if t.contains("\r\n") {
        t = t.replace("\r\n", "\n");
    }
    t
}

pub fn normalize_messages(messages: &mut [ChatMessage]) {
    for msg in messages {
        msg.content = clean_text(&msg.content);
    }
}

pub fn normalize_request(mut req: RelayRequest) -> RelayRequest {
    normalize_messages(&mut req.messages);
    req.selected_model = req.selected_model.trim().to_string();
    req.server_url = req.server_url.trim().trim_end_matches('/').to_string();
    req
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_req(content: &str) -> RelayRequest {
        RelayRequest {
            messages: vec![ChatMessage::user(content)],
            selected_model: " qwen3-8b ".into(),
            server_url: "http://localhost:1234/ ".into(),
            enable_thinking: false,
        }
    }

    #[test]
    fn unicode_nfc_and_crlf_normalization() {
        // "e" + combining acute accent should normalize to "é"
        let out = normalize_request(mk_req("e\u{301}"));
        assert_eq!(out.messages[0].content, "é");

        let out2 = normalize_request(mk_req("line1\r\nline2"));
        assert_eq!(out2.messages[0].content, "line1\nline2");
    }

    #[test]
    fn strips_bom_but_keeps_whitespace() {
        let out = normalize_request(mk_req("\u{FEFF}  indented\n"));
        assert_eq!(out.messages[0].content, "  indented\n");
    }

    #[test]
    fn trims_model_and_trailing_slash_of_server() {
        let out = normalize_request(mk_req("hi"));
        assert_eq!(out.selected_model, "qwen3-8b");
        assert_eq!(out.server_url, "http://localhost:1234");
    }
}
