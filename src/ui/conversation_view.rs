use chrono::{Local, Offset, Utc};
use gtk4::prelude::*;
use gtk4 as gtk;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use crate::api::client::ApiClient;
use crate::api::models::{ConversationSummary, QuoteDecision, SenderRole, Session};
use crate::api::realtime::websocket_url;
use crate::app::AppState;
use crate::conversation::quote_card::QuoteCard;
use crate::conversation::thread::{build_thread, Alignment, Bubble, BubbleBody, ThreadRow};
use crate::conversation::{ChangeListener, ConversationController};
use crate::error::Result;

/// One open conversation: banner, message list and composer.
pub struct ConversationView {
    root: gtk::Box,
    controller: Arc<ConversationController>,
    updates: RefCell<Option<glib::SourceId>>,
}

fn quote_widget(card: &QuoteCard, controller: &Arc<ConversationController>) -> gtk::Widget {
    let frame = gtk::Frame::new(Some("Quote"));
    let inner = gtk::Box::new(gtk::Orientation::Vertical, 4);
    inner.set_margin_top(8);
    inner.set_margin_bottom(8);
    inner.set_margin_start(8);
    inner.set_margin_end(8);

    let total = gtk::Label::new(Some(&card.total_label));
    total.add_css_class("title-3");
    total.set_halign(gtk::Align::Start);
    inner.append(&total);
    for line in [card.per_person_label.as_deref(), card.message.as_deref(), card.expiry_label.as_deref()]
        .into_iter()
        .flatten()
    {
        let lbl = gtk::Label::new(Some(line));
        lbl.set_wrap(true);
        lbl.set_halign(gtk::Align::Start);
        inner.append(&lbl);
    }
    let status = gtk::Label::new(Some(card.status.label()));
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    inner.append(&status);

    if card.show_actions {
        let actions = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        for (label, decision, css) in [
            ("Accept", QuoteDecision::Accept, "suggested-action"),
            ("Reject", QuoteDecision::Reject, "destructive-action"),
        ] {
            let btn = gtk::Button::with_label(label);
            btn.add_css_class(css);
            let controller = controller.clone();
            let quote_id = card.quote_id.clone();
            btn.connect_clicked(move |b| {
                b.set_sensitive(false);
                let controller = controller.clone();
                let quote_id = quote_id.clone();
                crate::utils::spawn_async(async move {
                    let _ = controller.respond_to_quote(&quote_id, decision).await;
                });
            });
            actions.append(&btn);
        }
        inner.append(&actions);
    }
    frame.set_child(Some(&inner));
    frame.upcast()
}

fn bubble_widget(bubble: &Bubble, controller: &Arc<ConversationController>) -> gtk::Widget {
    let column = gtk::Box::new(gtk::Orientation::Vertical, 2);
    column.add_css_class("card");
    column.set_halign(match bubble.alignment {
        Alignment::Incoming => gtk::Align::Start,
        Alignment::Outgoing => gtk::Align::End,
    });

    match &bubble.body {
        BubbleBody::Text(text) => {
            let lbl = gtk::Label::new(Some(text));
            lbl.set_wrap(true);
            lbl.set_selectable(true);
            lbl.set_max_width_chars(48);
            lbl.set_xalign(0.0);
            lbl.set_margin_top(6);
            lbl.set_margin_start(10);
            lbl.set_margin_end(10);
            column.append(&lbl);
        }
        BubbleBody::Quote(card) => column.append(&quote_widget(card, controller)),
    }

    let meta = match bubble.receipt {
        Some(receipt) => format!("{} {}", bubble.time_label, receipt.glyph()),
        None => bubble.time_label.clone(),
    };
    let meta = gtk::Label::new(Some(&meta));
    meta.add_css_class("caption");
    meta.add_css_class("dim-label");
    meta.set_halign(gtk::Align::End);
    meta.set_margin_bottom(4);
    meta.set_margin_end(8);
    column.append(&meta);
    column.upcast()
}

impl ConversationView {
    pub fn new(state: &AppState, session: &Session, summary: &ConversationSummary) -> Result<Rc<Self>> {
        let api = ApiClient::from_state(state)?;
        let realtime_url = websocket_url(&state.backend_url, &state.anon_key)?;
        let offset = Local::now().offset().fix();
        let currency = state.currency.clone();

        let (tx, rx) = crate::utils::glib_channel::<()>();
        let tx = Mutex::new(tx);
        let listener: ChangeListener = Arc::new(move || {
            if let Ok(tx) = tx.lock() {
                let _ = tx.send(());
            }
        });
        let controller = ConversationController::new(
            api,
            session,
            summary.id.clone(),
            state.page_size,
            offset,
            listener,
        );

        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);
        root.set_hexpand(true);

        let title = gtk::Label::new(Some(&summary.counterpart_name));
        title.add_css_class("title-4");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        // Banner
        let banner = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        banner.add_css_class("card");
        banner.set_visible(false);
        let banner_label = gtk::Label::new(None);
        banner_label.add_css_class("error");
        banner_label.set_hexpand(true);
        banner_label.set_wrap(true);
        banner_label.set_xalign(0.0);
        banner_label.set_margin_start(8);
        let dismiss = gtk::Button::from_icon_name("window-close-symbolic");
        dismiss.add_css_class("flat");
        banner.append(&banner_label);
        banner.append(&dismiss);
        root.append(&banner);
        {
            let controller = controller.clone();
            dismiss.connect_clicked(move |_| controller.dismiss_banner());
        }

        let older_btn = gtk::Button::with_label("Load earlier messages");
        older_btn.add_css_class("flat");
        older_btn.set_visible(false);
        root.append(&older_btn);
        {
            let controller = controller.clone();
            older_btn.connect_clicked(move |_| {
                let controller = controller.clone();
                crate::utils::spawn_async(async move {
                    let _ = controller.load_older().await;
                });
            });
        }

        let scroller = gtk::ScrolledWindow::builder().vexpand(true).hexpand(true).build();
        let messages_box = gtk::Box::new(gtk::Orientation::Vertical, 6);
        scroller.set_child(Some(&messages_box));
        root.append(&scroller);

        // Input row
        let input_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let entry = gtk::Entry::new();
        entry.set_hexpand(true);
        entry.set_placeholder_text(Some("Type a message…"));
        let send_btn = gtk::Button::with_label("Send");
        send_btn.add_css_class("suggested-action");
        input_row.append(&entry);
        input_row.append(&send_btn);
        if session.role == SenderRole::Vendor {
            let quote_btn = gtk::Button::with_label("Send Quote");
            let controller = controller.clone();
            quote_btn.connect_clicked(move |b| {
                let parent = b.root().and_then(|r| r.downcast::<gtk::Window>().ok());
                crate::ui::quote_dialog::show_quote_dialog(parent.as_ref(), controller.clone());
            });
            input_row.append(&quote_btn);
        }
        root.append(&input_row);

        // Send actions
        {
            let entry_for_send = entry.clone();
            let controller = controller.clone();
            let send: Rc<dyn Fn()> = Rc::new(move || {
                let text = entry_for_send.text().to_string();
                if text.trim().is_empty() {
                    return;
                }
                entry_for_send.set_text("");
                let controller = controller.clone();
                crate::utils::spawn_async(async move {
                    let _ = controller.send_text(&text).await;
                });
            });
            {
                let send = send.clone();
                send_btn.connect_clicked(move |_| (send)());
            }
            {
                let send = send.clone();
                entry.connect_activate(move |_| (send)());
            }
        }

        // Re-render from the controller's state on every change
        let rendered = Cell::new(0usize);
        let source = {
            let controller = controller.clone();
            rx.attach(None, move |()| {
                let (view, banner_text, has_older) = controller.with_state(|s| {
                    (
                        build_thread(s.messages(), s.viewer_role(), Utc::now(), offset, &currency),
                        s.banner().map(str::to_string),
                        s.has_older(),
                    )
                });

                banner.set_visible(banner_text.is_some());
                banner_label.set_label(banner_text.as_deref().unwrap_or(""));
                older_btn.set_visible(has_older);

                while let Some(child) = messages_box.first_child() {
                    messages_box.remove(&child);
                }
                for row in &view.rows {
                    match row {
                        ThreadRow::DaySeparator(label) => {
                            let sep = gtk::Label::new(Some(label));
                            sep.add_css_class("dim-label");
                            sep.set_halign(gtk::Align::Center);
                            messages_box.append(&sep);
                        }
                        ThreadRow::Bubble(bubble) => messages_box.append(&bubble_widget(bubble, &controller)),
                    }
                }

                if view.grew_since(rendered.get()) {
                    let scroller = scroller.clone();
                    glib::idle_add_local_once(move || {
                        let adj = scroller.vadjustment();
                        adj.set_value(adj.upper());
                    });
                }
                rendered.set(view.message_count);
                glib::ControlFlow::Continue
            })
        };

        {
            let controller = controller.clone();
            crate::utils::spawn_async(async move {
                if controller.open(&realtime_url).await.is_ok() {
                    log::info!("Conversation {} is live", controller.conversation());
                }
            });
        }

        Ok(Rc::new(Self { root, controller, updates: RefCell::new(Some(source)) }))
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    /// Stops rendering and detaches the change feed.
    pub fn close(&self) {
        if let Some(source) = self.updates.borrow_mut().take() {
            source.remove();
        }
        let controller = self.controller.clone();
        crate::utils::spawn_async(async move {
            controller.close().await;
        });
    }
}
