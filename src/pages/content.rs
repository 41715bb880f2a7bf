//! Static legal and informational texts, German and English.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Section {
    pub heading: &'static str,
    pub paragraphs: &'static [&'static str],
}

#[derive(Debug)]
pub struct LocalizedPage {
    pub title: &'static str,
    pub sections: &'static [Section],
}

#[derive(Debug)]
pub struct PageContent {
    pub slug: &'static str,
    pub de: LocalizedPage,
    pub en: LocalizedPage,
}

pub static PAGES: &[PageContent] = &[PRIVACY, IMPRESSUM, DEVELOPER, UPDATES];

const PRIVACY: PageContent = PageContent {
    slug: "privacy",
    de: LocalizedPage {
        title: "Datenschutzerklärung",
        sections: &[
            Section {
                heading: "1. Verantwortliche Stelle",
                paragraphs: &[
                    "Verantwortlich für die Datenverarbeitung auf ThreadUp ist der im Impressum genannte Betreiber.",
                ],
            },
            Section {
                heading: "2. Welche Daten wir verarbeiten",
                paragraphs: &[
                    "Bei der Registrierung speichern wir Benutzername, E-Mail-Adresse, optional Vor- und Nachname sowie ein mit Argon2 gehashtes Passwort.",
                    "Inhalte, die du veröffentlichst (Beiträge, Bilder, Kommentare, Likes und Follows), werden gespeichert, um sie dir und anderen Nutzern anzuzeigen.",
                ],
            },
            Section {
                heading: "3. Cookies",
                paragraphs: &[
                    "Wir setzen ausschließlich ein technisch notwendiges Cookie (\"token\"), das deine Anmeldung enthält. Es wird nicht für Tracking verwendet.",
                ],
            },
            Section {
                heading: "4. E-Mail-Versand",
                paragraphs: &[
                    "Für Bestätigungs- und Passwort-Mails nutzen wir den Dienstleister Resend. Dabei wird deine E-Mail-Adresse an Resend übermittelt.",
                ],
            },
            Section {
                heading: "5. Deine Rechte",
                paragraphs: &[
                    "Du hast das Recht auf Auskunft, Berichtigung, Löschung und Einschränkung der Verarbeitung deiner Daten sowie auf Datenübertragbarkeit (Art. 15 bis 20 DSGVO).",
                    "Außerdem kannst du dich bei einer Datenschutz-Aufsichtsbehörde beschweren.",
                ],
            },
        ],
    },
    en: LocalizedPage {
        title: "Privacy Policy",
        sections: &[
            Section {
                heading: "1. Controller",
                paragraphs: &[
                    "The operator named in the legal notice (Impressum) is responsible for data processing on ThreadUp.",
                ],
            },
            Section {
                heading: "2. Data we process",
                paragraphs: &[
                    "When you sign up we store your username, email address, optionally your first and last name, and a password hashed with Argon2.",
                    "Content you publish (posts, images, comments, likes and follows) is stored so it can be shown to you and other users.",
                ],
            },
            Section {
                heading: "3. Cookies",
                paragraphs: &[
                    "We only set one strictly necessary cookie (\"token\") that holds your sign-in. It is never used for tracking.",
                ],
            },
            Section {
                heading: "4. Email delivery",
                paragraphs: &[
                    "Verification and password emails are delivered through Resend. Your email address is shared with Resend for that purpose.",
                ],
            },
            Section {
                heading: "5. Your rights",
                paragraphs: &[
                    "You have the right to access, rectify, erase and restrict the processing of your data and to data portability (Art. 15 to 20 GDPR).",
                    "You may also lodge a complaint with a data protection supervisory authority.",
                ],
            },
        ],
    },
};

const IMPRESSUM: PageContent = PageContent {
    slug: "impressum",
    de: LocalizedPage {
        title: "Impressum",
        sections: &[
            Section {
                heading: "Angaben gemäß § 5 DDG",
                paragraphs: &["ThreadUp", "Musterstraße 1", "12345 Musterstadt", "Deutschland"],
            },
            Section {
                heading: "Kontakt",
                paragraphs: &["E-Mail: kontakt@threadup.app"],
            },
            Section {
                heading: "Haftung für Inhalte",
                paragraphs: &[
                    "Für Inhalte, die Nutzer veröffentlichen, sind die jeweiligen Nutzer verantwortlich. Bei Bekanntwerden von Rechtsverletzungen entfernen wir die betreffenden Inhalte umgehend.",
                ],
            },
        ],
    },
    en: LocalizedPage {
        title: "Legal Notice",
        sections: &[
            Section {
                heading: "Information according to § 5 DDG",
                paragraphs: &["ThreadUp", "Musterstraße 1", "12345 Musterstadt", "Germany"],
            },
            Section {
                heading: "Contact",
                paragraphs: &["Email: kontakt@threadup.app"],
            },
            Section {
                heading: "Liability for content",
                paragraphs: &[
                    "Users are responsible for the content they publish. We remove content promptly once we become aware of an infringement.",
                ],
            },
        ],
    },
};

const DEVELOPER: PageContent = PageContent {
    slug: "developer",
    de: LocalizedPage {
        title: "Entwickler",
        sections: &[
            Section {
                heading: "Über ThreadUp",
                paragraphs: &[
                    "ThreadUp ist ein kleines soziales Netzwerk für Beiträge, Bilder und Gespräche.",
                ],
            },
            Section {
                heading: "API",
                paragraphs: &[
                    "Alle Funktionen der Oberfläche stehen über eine JSON-API unter /api zur Verfügung. Antworten haben immer die Form {\"success\", \"message\", \"data\"}.",
                    "Die Anmeldung erfolgt per Bearer-Token oder über das Cookie \"token\".",
                ],
            },
        ],
    },
    en: LocalizedPage {
        title: "Developer",
        sections: &[
            Section {
                heading: "About ThreadUp",
                paragraphs: &["ThreadUp is a small social network for posts, pictures and conversations."],
            },
            Section {
                heading: "API",
                paragraphs: &[
                    "Everything the interface does is available through a JSON API under /api. Responses always have the shape {\"success\", \"message\", \"data\"}.",
                    "Authenticate with a bearer token or the \"token\" cookie.",
                ],
            },
        ],
    },
};

const UPDATES: PageContent = PageContent {
    slug: "updates",
    de: LocalizedPage {
        title: "Neuigkeiten",
        sections: &[
            Section {
                heading: "Version 1.2",
                paragraphs: &[
                    "Vorschläge, wem du folgen kannst, berücksichtigen jetzt gemeinsame Kontakte.",
                    "Bilder lassen sich vor dem Hochladen zuschneiden.",
                ],
            },
            Section {
                heading: "Version 1.1",
                paragraphs: &["Kommentare können bearbeitet und gelöscht werden."],
            },
            Section {
                heading: "Version 1.0",
                paragraphs: &["Erste Veröffentlichung von ThreadUp."],
            },
        ],
    },
    en: LocalizedPage {
        title: "Updates",
        sections: &[
            Section {
                heading: "Version 1.2",
                paragraphs: &[
                    "Follow suggestions now take mutual connections into account.",
                    "Images can be cropped before uploading.",
                ],
            },
            Section {
                heading: "Version 1.1",
                paragraphs: &["Comments can be edited and deleted."],
            },
            Section {
                heading: "Version 1.0",
                paragraphs: &["First release of ThreadUp."],
            },
        ],
    },
};
