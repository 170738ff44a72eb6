//! Welcome Window Styling (style)
//!
//! Loads the runtime stylesheet through the standard GTK4 CSS provider.
//! Dark glassy cards, rounded buttons and a black console pane; the palette
//! leans on Catppuccin blues with plain red/green status dots.

use gtk4::gdk;

pub fn load_css() {
    let provider = gtk4::CssProvider::new();

    // Kept in the binary so the app works from any working directory.
    provider.load_from_data(
        "
        window {
            background-color: rgba(30, 30, 46, 0.98);
        }

        .zone {
            padding: 12px;
            background-color: rgba(255, 255, 255, 0.08);
            border-radius: 12px;
        }

        .app-title {
            font-size: 22px;
            font-weight: bold;
            color: #89b4fa;
        }

        .app-subtitle {
            font-size: 12px;
            color: alpha(white, 0.6);
        }

        /* --- STATUS LIGHTS --- */
        .light {
            font-size: 16px;
            color: alpha(white, 0.15);
        }

        .light-ready.lit {
            color: #a6e3a1;
        }

        .light-busy.lit {
            color: #f38ba8;
        }

        /* --- BUTTONS --- */
        .tool-btn, .link-btn {
            border-radius: 10px;
            background-color: rgba(255, 255, 255, 0.1);
            color: white;
            border: none;
            box-shadow: none;
            background-image: none;
        }

        .tool-btn:hover, .link-btn:hover {
            background-color: rgba(255, 255, 255, 0.2);
        }

        .tool-label {
            font-size: 12px;
        }

        .install-btn {
            background-color: #3584e4;
            color: white;
            font-weight: bold;
            border-radius: 10px;
            padding: 10px 24px;
        }

        .install-btn:hover {
            background-color: #1c71d8;
        }

        /* --- CONSOLE PANE --- */
        .console {
            font-family: 'JetBrainsMono Nerd Font', 'Roboto Mono', monospace;
            font-size: 11px;
        }

        .console text {
            background-color: black;
            color: #cdd6f4;
        }

        .status-line {
            font-size: 11px;
            color: alpha(white, 0.7);
        }

        .section-title {
            font-size: 14px;
            font-weight: bold;
            color: #89b4fa;
        }
    ",
    );

    if let Some(display) = gdk::Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    }
}
