//! User-facing strings and their German translations.
//!
//! English is the source language. The German catalog mirrors the
//! translation shipped with the desktop version, so both interfaces read the
//! same. Only [`Message::MoodleSite`] takes a parameter (`{}`).

/// Interface language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    English,
    German,
}

impl Locale {
    /// Resolve the `ui.language` setting. `auto` looks at the environment.
    pub fn from_setting(setting: &str) -> Self {
        match setting.trim().to_lowercase().as_str() {
            "de" | "de_de" | "german" | "deutsch" => Self::German,
            "en" | "en_us" | "en_gb" | "english" => Self::English,
            _ => Self::from_env(),
        }
    }

    /// Pick the locale from `LC_ALL`, `LC_MESSAGES` or `LANG`.
    pub fn from_env() -> Self {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
            .map_or(Self::English, |value| Self::from_tag(&value))
    }

    /// Map a POSIX locale tag like `de_DE.UTF-8`.
    pub fn from_tag(tag: &str) -> Self {
        if tag.to_lowercase().starts_with("de") {
            Self::German
        } else {
            Self::English
        }
    }
}

macro_rules! catalog {
    ($($variant:ident => $en:literal, $de:literal;)*) => {
        /// Every translatable string.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Message {
            $($variant,)*
        }

        impl Message {
            /// All messages, in catalog order.
            pub const ALL: &'static [Message] = &[$(Message::$variant,)*];

            /// English source text.
            pub fn source(self) -> &'static str {
                match self {
                    $(Message::$variant => $en,)*
                }
            }

            /// German translation.
            pub fn german(self) -> &'static str {
                match self {
                    $(Message::$variant => $de,)*
                }
            }
        }
    };
}

catalog! {
    // Credentials dialog
    EnterCredentials => "Enter credentials...", "Benutzerdaten eingeben...";
    UsernameLabel => "Username: ", "Benutzername: ";
    UsernamePlaceholder => "username", "benutzer";
    PasswordLabel => "Password: ", "Passwort: ";
    PasswordPlaceholder => "password", "passwort";

    // Main window
    AppTitle => "Moodle2PDF", "Moodle2PDF";
    EditorTitle => "MoodleEditor", "MoodleEditor";
    ActivitiesAndMaterials => "Activities and Materials", "Aktivitäten und Materialien";
    MoodleSiteRoot => "Moodle Site", "Moodle-Seite";
    MoodleSite => "Moodle Site ({})", "Moodle-Seite ({})";
    Export => "Export", "Exportieren";
    CombineIntoOne => "Combine all glossaries into one PDF file", "Alle Module in eine gemeinsame PDF-Datei ausgeben";
    Visibility => "Visibility", "Sichtbarkeit";
    File => "File", "Datei";
    Help => "Help", "Hilfe";
    Settings => "Settings", "Einstellungen";
    Info => "Info", "Info";
    Quit => "Quit", "Beenden";
    SetSite => "Set Site...", "Server-Adresse setzen...";

    // Site dialog and login
    LoggingIn => "Logging in to Moodle site...", "Einloggen in Moodle-Seite...";
    EnterSiteUrl => "Enter site URL", "Server-Adresse eingeben";
    SiteUrlLabel => "Site URL:", "Server-Adresse:";
    Error => "Error", "Fehler";
    WrongCredentials => "Wrong site URL or credentials.", "Falsche Adresse oder Benutzerdaten.";
    LoggedIn => "Logged in.", "Eingeloggt.";

    // Loading
    LoadingGlossaries => "Loading all glossaries for course...", "Lade alle Glossare aus Kurs...";
    GlossariesLoaded => "All glossaries loaded.", "Alle Glossare geladen.";
    LoadingWikis => "Loading all wikis for course...", "Lade alle Wikis aus Kurs...";
    WikisLoaded => "All wikis loaded.", "Alle Wikis geladen.";
    LoadingDatabases => "Loading all databases for course...", "Lade alle Datenbanken aus Kurs...";
    DatabasesLoaded => "All databases loaded.", "Alle Datenbanken geladen.";
    LoadingModules => "Loading all modules for course...", "Lade alle Module aus Kurs...";
    ModulesLoaded => "All modules loaded.", "Alle Module geladen.";

    // Visibility
    ChangingSectionVisibility => "Changing visibility for section...", "Sichtbarkeit des Abschnitts ändern...";
    ChangingModuleVisibility => "Changing visibility for module...", "Sichtbarkeit des Moduls ändern...";
    VisibilityChanged => "Visibility changed.", "Sichtbarkeit geändert.";

    // Export
    SaveAsPdf => "Save as PDF File...", "Speichere als PDF-Datei...";
    PdfFileFilter => "PDF File (*.pdf)", "PDF-Datei (*.pdf)";
    BuildingPdf => "Building PDF file...", "Baue PDF-Datei...";
    FinishedPdf => "Finished PDF file.", "PDF-Datei erstellt.";
    SeparateNotImplemented => "Separate export is not implemented yet.", "Export in einzelne Dateien ist noch nicht implementiert.";
    SelectModulesFirst => "You have to select some modules first.", "Bitte zuerst ein oder mehrere Module auswählen.";

    // About
    About => "About...", "Über...";
    AboutText => "Moodle2PDF\nExport Moodle glossaries, wikis and databases to PDF\nand change the visibility of course modules.", "Moodle2PDF\nExportiert Moodle-Glossare, -Wikis und -Datenbanken als PDF\nund ändert die Sichtbarkeit von Kursmodulen.";

    // Terminal interface
    Busy => "Please wait for the current operation to finish.", "Bitte warten, bis der aktuelle Vorgang abgeschlossen ist.";
    NotLoggedIn => "Not logged in.", "Nicht eingeloggt.";
    Hidden => "hidden", "verborgen";
    Shown => "visible", "sichtbar";
    KeyHints => "Enter open • Space select • v visibility • r reload • e export • c combine • Ctrl+S site • i info • q quit", "Enter öffnen • Leertaste auswählen • v Sichtbarkeit • r neu laden • e exportieren • c kombinieren • Strg+S Server • i Info • q beenden";
    DialogHints => "Enter confirm • Tab next field • Esc cancel", "Enter bestätigen • Tab nächstes Feld • Esc abbrechen";
    OkButton => "OK", "OK";
}

/// Looks up messages for one locale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Translator {
    locale: Locale,
}

impl Translator {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Translate a message.
    pub fn tr(&self, message: Message) -> &'static str {
        match self.locale {
            Locale::English => message.source(),
            Locale::German => message.german(),
        }
    }

    /// Translate a message and substitute its positional `{}` placeholder.
    pub fn format(&self, message: Message, arg: &str) -> String {
        self.tr(message).replacen("{}", arg, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_every_message_is_translated() {
        for message in Message::ALL {
            assert!(!message.source().is_empty(), "{message:?} has no source text");
            assert!(!message.german().is_empty(), "{message:?} has no German translation");
        }
    }

    #[test]
    fn test_placeholders_match() {
        for message in Message::ALL {
            assert_eq!(
                message.source().matches("{}").count(),
                message.german().matches("{}").count(),
                "placeholder mismatch in {message:?}"
            );
        }
    }

    #[test]
    fn test_site_label_substitution() {
        let de = Translator::new(Locale::German);
        assert_eq!(
            de.format(Message::MoodleSite, "https://moodle.example.org/"),
            "Moodle-Seite (https://moodle.example.org/)"
        );
        let en = Translator::new(Locale::English);
        assert_eq!(en.format(Message::MoodleSite, "x"), "Moodle Site (x)");
    }

    #[test]
    fn test_german_catalog_strings() {
        let de = Translator::new(Locale::German);
        assert_eq!(de.tr(Message::WrongCredentials), "Falsche Adresse oder Benutzerdaten.");
        assert_eq!(
            de.tr(Message::SelectModulesFirst),
            "Bitte zuerst ein oder mehrere Module auswählen."
        );
        assert_eq!(de.tr(Message::LoggedIn), "Eingeloggt.");
    }

    #[test]
    fn test_locale_from_tag() {
        assert_eq!(Locale::from_tag("de_DE.UTF-8"), Locale::German);
        assert_eq!(Locale::from_tag("en_US.UTF-8"), Locale::English);
        assert_eq!(Locale::from_tag("C"), Locale::English);
    }

    #[test]
    fn test_explicit_setting_wins() {
        assert_eq!(Locale::from_setting("de"), Locale::German);
        assert_eq!(Locale::from_setting("EN"), Locale::English);
    }

    #[test]
    #[serial]
    fn test_auto_setting_reads_environment() {
        let saved: Vec<_> =
            ["LC_ALL", "LC_MESSAGES", "LANG"].iter().map(|v| (*v, std::env::var(v).ok())).collect();

        std::env::remove_var("LC_ALL");
        std::env::remove_var("LC_MESSAGES");
        std::env::set_var("LANG", "de_DE.UTF-8");
        assert_eq!(Locale::from_setting("auto"), Locale::German);

        std::env::set_var("LANG", "en_GB.UTF-8");
        assert_eq!(Locale::from_setting("auto"), Locale::English);

        for (var, value) in saved {
            match value {
                Some(v) => std::env::set_var(var, v),
                None => std::env::remove_var(var),
            }
        }
    }
}
