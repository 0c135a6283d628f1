//! Carrier markup
//!
//! The XML document returned to the telephony carrier instructing it to
//! play audio (or speak text natively when synthesis is degraded) and
//! gather the next utterance.

/// Builder for one markup response
#[derive(Debug, Default, Clone)]
pub struct Markup {
    verbs: Vec<Verb>,
}

#[derive(Debug, Clone)]
enum Verb {
    Play(String),
    Say(String),
    Gather {
        action: String,
        timeout_secs: u8,
        inner: Vec<Verb>,
    },
    Hangup,
}

impl Markup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Play a synthesized audio URL
    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play(url.into()));
        self
    }

    /// Speak text with the carrier's native voice (degraded mode)
    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    /// Gather speech, posting the result to `action`
    pub fn gather(mut self, action: impl Into<String>, timeout_secs: u8, inner: Markup) -> Self {
        self.verbs.push(Verb::Gather {
            action: action.into(),
            timeout_secs,
            inner: inner.verbs,
        });
        self
    }

    /// End the call
    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Render the XML document
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
        for verb in &self.verbs {
            render_verb(&mut out, verb);
        }
        out.push_str("</Response>");
        out
    }

    /// Play the audio URL when synthesis succeeded, else speak the text
    pub fn voice(self, audio_url: Option<&str>, text: &str) -> Self {
        match audio_url {
            Some(url) => self.play(url),
            None => self.say(text),
        }
    }
}

fn render_verb(out: &mut String, verb: &Verb) {
    match verb {
        Verb::Play(url) => {
            out.push_str("<Play>");
            out.push_str(&escape(url));
            out.push_str("</Play>");
        }
        Verb::Say(text) => {
            out.push_str("<Say>");
            out.push_str(&escape(text));
            out.push_str("</Say>");
        }
        Verb::Gather { action, timeout_secs, inner } => {
            out.push_str(&format!(
                "<Gather input=\"speech\" method=\"POST\" action=\"{}\" timeout=\"{}\">",
                escape(action),
                timeout_secs
            ));
            for verb in inner {
                render_verb(out, verb);
            }
            out.push_str("</Gather>");
        }
        Verb::Hangup => out.push_str("<Hangup/>"),
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// A spoken (or played) turn followed by a speech gather
pub fn turn_markup(audio_url: Option<&str>, text: &str, action: &str, timeout_secs: u8) -> String {
    Markup::new()
        .gather(
            action,
            timeout_secs,
            Markup::new().voice(audio_url, text),
        )
        .to_xml()
}

/// Final utterance followed by hangup
pub fn exit_markup(audio_url: Option<&str>, text: &str) -> String {
    Markup::new().voice(audio_url, text).hangup().to_xml()
}

/// Minimal valid document for state violations
pub fn minimal_markup() -> String {
    Markup::new().hangup().to_xml()
}
