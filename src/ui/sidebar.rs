use gtk4::prelude::*;
use gtk4 as gtk;
use std::cell::RefCell;
use std::rc::Rc;

use crate::api::models::ConversationSummary;

pub struct Sidebar {
    root: gtk::Box,
    list: gtk::ListBox,
    items: Rc<RefCell<Vec<ConversationSummary>>>,
}

impl Sidebar {
    pub fn new() -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);
        root.set_width_request(260);

        let title = gtk::Label::new(Some("Conversations"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let list = gtk::ListBox::new();
        list.add_css_class("navigation-sidebar");
        let scroller = gtk::ScrolledWindow::builder().vexpand(true).child(&list).build();
        root.append(&scroller);

        Self { root, list, items: Rc::new(RefCell::new(Vec::new())) }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    /// Calls `f` with the conversation behind the activated row.
    pub fn connect_selected<F: Fn(ConversationSummary) + 'static>(&self, f: F) {
        let items = self.items.clone();
        self.list.connect_row_activated(move |_, row| {
            let picked = usize::try_from(row.index()).ok().and_then(|i| items.borrow().get(i).cloned());
            if let Some(summary) = picked {
                f(summary);
            }
        });
    }

    pub fn set_items(&self, items: Vec<ConversationSummary>) {
        while let Some(child) = self.list.first_child() {
            self.list.remove(&child);
        }
        for conv in &items {
            let row = gtk::ListBoxRow::new();
            let content = gtk::Box::new(gtk::Orientation::Vertical, 2);
            content.set_margin_top(8);
            content.set_margin_bottom(8);
            content.set_margin_start(8);
            content.set_margin_end(8);

            let top = gtk::Box::new(gtk::Orientation::Horizontal, 6);
            let name = gtk::Label::new(Some(&conv.counterpart_name));
            name.set_halign(gtk::Align::Start);
            name.set_hexpand(true);
            top.append(&name);
            if conv.unread_count > 0 {
                let badge = gtk::Label::new(Some(&conv.unread_count.to_string()));
                badge.add_css_class("accent");
                top.append(&badge);
            }
            content.append(&top);

            if let Some(last) = &conv.last_message {
                let preview = gtk::Label::new(Some(&crate::utils::preview(last, 40)));
                preview.add_css_class("dim-label");
                preview.set_halign(gtk::Align::Start);
                content.append(&preview);
            }
            row.set_child(Some(&content));
            self.list.append(&row);
        }
        *self.items.borrow_mut() = items;
    }
}
