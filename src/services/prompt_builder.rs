//! Maps a request descriptor onto the instruction sent to the model.
//!
//! Everything here is pure: the same descriptor always yields the same
//! prompt, and nothing touches the network.

use crate::config::GenerationSettings;
use crate::domain::{Action, ComposeContext, RequestContent, RequestDescriptor};

/// System instruction sent with every completion.
pub const SYSTEM_INSTRUCTION: &str = "Du bist ein professioneller E-Mail-Assistent. \
Achte auf korrekte Rechtschreibung, stilistisch angemessene Formulierungen und einen klaren, \
respektvollen Ton. Berücksichtige regionale Sprachvarianten (z. B. Deutschland, Österreich, \
Schweiz), falls angegeben. Verwende den bereitgestellten E-Mail-Inhalt als Grundlage, sofern \
kein separater Benutzertext gegeben ist.";

/// Builds the user-turn prompt for `descriptor`.
pub fn build_prompt(descriptor: &RequestDescriptor) -> String {
    let settings = &descriptor.settings;
    let base = base_context(&descriptor.content, settings);

    match descriptor.action {
        Action::Summarize => format!(
            "Fasse die folgende E-Mail präzise und übersichtlich zusammen. Liste Thema, \
             Anliegen und nächste Schritte untereinander mit Aufzählungspunkten (•) auf. \
             Schreibe auf {language} im {tone} Ton.\n\n{base}",
            language = settings.language,
            tone = settings.tone.label(),
        ),
        Action::Reply => reply_prompt(descriptor, &base),
        Action::Translate => format!(
            "Übersetze den folgenden Text vollständig ins {language}. Behalte den \
             ursprünglichen Ton und die Formatierung bei und achte auf professionellen \
             Sprachgebrauch und kulturelle Angemessenheit.\n\n{base}",
            language = settings.language,
        ),
        Action::Custom => {
            let instruction = descriptor.instruction.as_deref().unwrap_or_default();
            format!(
                "{base}\n\nSpezielle Anfrage: {instruction}\n\n\
                 Aufgabe: Bearbeite den Inhalt gemäss der speziellen Anfrage. Die spezielle \
                 Anfrage hat Vorrang vor den Einstellungen; berücksichtige die Einstellungen \
                 nur, wo sie ihr nicht widersprechen."
            )
        }
        Action::Compose => compose_prompt(&descriptor.content, settings),
        Action::Correct => rewrite_prompt(
            "Überarbeite den folgenden Text stilistisch und grammatikalisch – professionell, \
             klar und leserfreundlich:",
            descriptor,
        ),
        Action::FixSpelling => rewrite_prompt(
            "Korrigiere ausschliesslich die Rechtschreibfehler im folgenden Text. Der Stil \
             soll unverändert bleiben:",
            descriptor,
        ),
        Action::Rephrase => rewrite_prompt(
            "Formuliere den folgenden Text höflich und professionell um – ohne inhaltliche \
             Änderungen:",
            descriptor,
        ),
        Action::Simplify => rewrite_prompt(
            "Vereinfache den folgenden Text sprachlich, ohne die Aussage zu verändern. Ziel ist \
             eine klarere, leichter verständliche Ausdrucksweise:",
            descriptor,
        ),
    }
}

fn base_context(content: &RequestContent, settings: &GenerationSettings) -> String {
    let content_block = match content {
        RequestContent::Email(text) => format!("E-Mail Inhalt:\n\"{text}\""),
        RequestContent::Compose(context) => format!(
            "Neue E-Mail:\n- An: {to}\n- Betreff: {subject}\n- Zweck: {purpose}",
            to = recipients(context),
            subject = context.subject,
            purpose = context.purpose,
        ),
    };

    format!(
        "{content_block}\n\nEinstellungen:\n- Ton: {tone}\n- Anrede: {salutation}\n\
         - Länge: {length}\n- Sprache: {language}",
        tone = settings.tone.label(),
        salutation = settings.salutation.label(),
        length = settings.length.label(),
        language = settings.language,
    )
}

fn reply_prompt(descriptor: &RequestDescriptor, base: &str) -> String {
    let settings = &descriptor.settings;
    let greeting = match descriptor.recipient_name.as_deref() {
        Some(name) => format!("Hallo {name},"),
        None => "Hallo,".to_string(),
    };

    format!(
        "Formuliere eine Antwort auf die folgende E-Mail im {tone} Ton mit der Anrede \
         {salutation} ({length}). Schreibe auf {language}.\n\n\
         Rechtschreibung: Verwende die Rechtschreibung für {region}.\n\n\
         Begrüssung: Beginne die Antwort mit: „{greeting}\"\n\n\
         Grussformel: Lasse die Grussformel und die Signatur am Ende der E-Mail komplett weg.\n\n\
         Formatierung: Lasse den Betreff vollständig weg und bringe ihn nicht in die Antwort ein.\n\n\
         {base}",
        tone = settings.tone.label(),
        salutation = settings.salutation.label(),
        length = settings.length.label(),
        language = settings.language,
        region = settings.region,
    )
}

fn compose_prompt(content: &RequestContent, settings: &GenerationSettings) -> String {
    // Read mode: draft a fresh email prompted by the open message.
    let context = content.compose_context().cloned().unwrap_or_else(|| ComposeContext {
        purpose: format!(
            "Bezug auf folgende E-Mail: \"{}\"",
            content.email_text().unwrap_or_default()
        ),
        ..Default::default()
    });

    let subject = if context.subject.trim().is_empty() {
        "(passend zum Zweck)".to_string()
    } else {
        context.subject.clone()
    };

    format!(
        "Verfasse eine neue E-Mail an {to} mit dem Betreff \"{subject}\". Zweck der E-Mail: \
         {purpose}. Achte auf einen klaren Aufbau, eine passende Begrüssung und Grussformel und \
         einen passenden Stil ({tone}, Anrede {salutation}, Länge {length}). Schreibe auf \
         {language} und verwende die Rechtschreibung für {region}.",
        to = recipients(&context),
        purpose = context.purpose,
        tone = settings.tone.label(),
        salutation = settings.salutation.label(),
        length = settings.length.label(),
        language = settings.language,
        region = settings.region,
    )
}

fn rewrite_prompt(task: &str, descriptor: &RequestDescriptor) -> String {
    let text = match (&descriptor.instruction, &descriptor.content) {
        (Some(instruction), _) => instruction.clone(),
        (None, RequestContent::Email(text)) => text.clone(),
        (None, RequestContent::Compose(context)) => context.purpose.clone(),
    };
    format!(
        "{task}\n\n\"{text}\"\n\nSchreibe auf {language}.",
        language = descriptor.settings.language
    )
}

fn recipients(context: &ComposeContext) -> String {
    if context.to.is_empty() {
        "den Empfänger".to_string()
    } else {
        context.to.join(", ")
    }
}
