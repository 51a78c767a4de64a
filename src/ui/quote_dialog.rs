use gtk4 as gtk;
use gtk4::prelude::*;
use std::sync::Arc;

use crate::conversation::composer::QuoteDraft;
use crate::conversation::ConversationController;

fn field(content: &gtk::Box, placeholder: &str) -> gtk::Entry {
    let entry = gtk::Entry::new();
    entry.set_placeholder_text(Some(placeholder));
    entry.set_hexpand(true);
    content.append(&entry);
    entry
}

/// Vendor-side quote form. Validation and send errors show up in the
/// conversation banner.
pub fn show_quote_dialog(parent: Option<&gtk::Window>, controller: Arc<ConversationController>) {
    let dialog = gtk::Dialog::builder().title("Send Quote").modal(true).build();
    if let Some(parent) = parent {
        dialog.set_transient_for(Some(parent));
    }
    let content = gtk::Box::new(gtk::Orientation::Vertical, 8);
    content.set_margin_top(12);
    content.set_margin_bottom(12);
    content.set_margin_start(12);
    content.set_margin_end(12);

    let total = field(&content, "Total price");
    let per_person = field(&content, "Price per person (optional)");
    let valid_until = field(&content, "Valid until, YYYY-MM-DD (optional)");
    let message = field(&content, "Message (optional)");

    dialog.content_area().append(&content);
    let _ = dialog.add_button("Cancel", gtk::ResponseType::Cancel);
    let ok_btn = dialog.add_button("Send", gtk::ResponseType::Ok);
    ok_btn.add_css_class("suggested-action");
    dialog.set_default_response(gtk::ResponseType::Ok);

    dialog.connect_response(move |dlg, resp| {
        if resp == gtk::ResponseType::Ok {
            let draft = QuoteDraft {
                total_price: total.text().to_string(),
                price_per_person: per_person.text().to_string(),
                message: message.text().to_string(),
                valid_until: valid_until.text().to_string(),
            };
            let controller = controller.clone();
            crate::utils::spawn_async(async move {
                if controller.send_quote(&draft).await.is_ok() {
                    log::info!("Quote sent in {}", controller.conversation());
                }
            });
        }
        dlg.close();
    });

    dialog.present();
}
