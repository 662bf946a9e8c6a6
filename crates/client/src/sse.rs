/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser. Feed it chunks as they arrive;
/// complete events come out, partial lines are kept for the next chunk.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> Vec<SseMessage> {
        self.pending.push_str(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(message) = self.line(line) {
                out.push(message);
            }
        }
        out
    }

    fn line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseMessage {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push("event: hello\ndata: {\"connec").is_empty());
        let out = decoder.push("tionId\":\"abc\"}\n\nevent:state:update\r\ndata:{}\r\n\r\n");
        assert_eq!(
            out,
            vec![
                SseMessage {
                    event: "hello".to_string(),
                    data: "{\"connectionId\":\"abc\"}".to_string()
                },
                SseMessage {
                    event: "state:update".to_string(),
                    data: "{}".to_string()
                },
            ]
        );
    }

    #[test]
    fn ignores_comments_and_joins_data_lines() {
        let mut decoder = SseDecoder::new();
        let out = decoder.push(": keep-alive\n\ndata: a\ndata: b\nid: 4\n\n");
        assert_eq!(
            out,
            vec![SseMessage {
                event: "message".to_string(),
                data: "a\nb".to_string()
            }]
        );
    }
}
