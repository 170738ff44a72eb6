//! Widget Helpers (helpers)

use gtk4::prelude::*;

/// A grid button for the utilities page: icon on top, label underneath.
pub fn make_tool_button(icon_name: &str, label: &str) -> gtk4::Button {
    let icon = gtk4::Image::builder()
        .icon_name(icon_name)
        .pixel_size(32)
        .build();

    let text = gtk4::Label::builder()
        .label(label)
        .css_classes(vec!["tool-label".to_string()])
        .build();

    let vbox = gtk4::Box::new(gtk4::Orientation::Vertical, 6);
    vbox.set_margin_top(8);
    vbox.set_margin_bottom(8);
    vbox.append(&icon);
    vbox.append(&text);

    gtk4::Button::builder()
        .child(&vbox)
        .css_classes(vec!["tool-btn".to_string()])
        .width_request(130)
        .build()
}

/// A link button for the links page: small icon plus label in a row.
pub fn make_link_button(icon_name: &str, label: &str) -> gtk4::Button {
    let icon = gtk4::Image::builder()
        .icon_name(icon_name)
        .pixel_size(18)
        .build();

    let text = gtk4::Label::builder()
        .label(label)
        .halign(gtk4::Align::Start)
        .hexpand(true)
        .build();

    let hbox = gtk4::Box::new(gtk4::Orientation::Horizontal, 10);
    hbox.set_margin_start(6);
    hbox.set_margin_end(6);
    hbox.append(&icon);
    hbox.append(&text);

    gtk4::Button::builder()
        .child(&hbox)
        .css_classes(vec!["link-btn".to_string()])
        .width_request(200)
        .build()
}

/// A labeled switch row for the installer options.
pub fn make_switch_row(label: &str) -> (gtk4::Box, gtk4::Switch) {
    let text = gtk4::Label::builder()
        .label(label)
        .halign(gtk4::Align::Start)
        .hexpand(true)
        .build();

    let switch = gtk4::Switch::builder()
        .valign(gtk4::Align::Center)
        .build();

    let row = gtk4::Box::new(gtk4::Orientation::Horizontal, 10);
    row.append(&text);
    row.append(&switch);
    (row, switch)
}
