//! Style directives appended to the source message when building a prompt.

use crate::config::StyleLanguage;

const DIRECTIVE_ID: &str = "Balas dengan santai, akrab, dan ramah seperti ngobrol dengan teman. \
Jangan pakai simbol atau kata-kata rumit, cukup bicara dengan natural seperti orang yang suka mengobrol dan selalu siap membantu.";

const DIRECTIVE_EN: &str = "Reply in a relaxed, youthful and friendly way, like chatting with a friend. \
Don't use symbols or complicated words, just talk naturally like someone who loves to chat and is always happy to help.";

const DIRECTIVE_PT: &str = "Responda de forma descontraída, jovem e simpática, como se fosse uma conversa de amigo. \
Não use símbolos ou palavras complicadas, só fale de forma natural, como alguém que ama bater papo e está sempre disposto a ajudar.";

/// Directive for a language. Unsupported codes get the default (Indonesian) directive.
pub fn directive(language: StyleLanguage) -> &'static str {
    match language {
        StyleLanguage::Indonesian => DIRECTIVE_ID,
        StyleLanguage::English => DIRECTIVE_EN,
        StyleLanguage::Portuguese => DIRECTIVE_PT,
        StyleLanguage::Unsupported => DIRECTIVE_ID,
    }
}

pub fn build_prompt(source_text: &str, language: StyleLanguage) -> String {
    format!("{}\n\n{}", source_text, directive(language))
}
