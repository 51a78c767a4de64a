use adw::prelude::*;
use adw::Application;
use std::cell::RefCell;
use std::rc::Rc;

use crate::api::client::ApiClient;
use crate::api::models::Session;
use crate::app::AppState;
use crate::storage::Cache;
use crate::ui::conversation_view::ConversationView;

fn placeholder() -> gtk4::Widget {
    let page = adw::StatusPage::builder()
        .title("No conversation selected")
        .description("Pick a conversation from the list.")
        .icon_name("mail-unread-symbolic")
        .build();
    page.upcast()
}

pub fn show_main_window(app: &Application, session: Session) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Catering Chat")
        .default_width(1024)
        .default_height(680)
        .build();

    let overlay = adw::ToastOverlay::new();

    let split = adw::Flap::builder()
        .reveal_flap(true)
        .locked(true)
        .modal(false)
        .build();

    let sidebar = Rc::new(crate::ui::sidebar::Sidebar::new());
    split.set_flap(Some(&sidebar.widget()));
    split.set_content(Some(&placeholder()));

    overlay.set_child(Some(&split));

    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let title = gtk4::Label::new(Some(session.display_name.as_deref().unwrap_or("Catering Chat")));
    header.set_title_widget(Some(&title));

    let sign_out_btn = gtk4::Button::with_label("Sign Out");
    header.pack_end(&sign_out_btn);
    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));
    window.present();

    let state = AppState::load();
    match Cache::open_default().and_then(|cache| cache.conversations(Some(200))) {
        Ok(cached) if !cached.is_empty() => sidebar.set_items(cached),
        Ok(_) => {}
        Err(e) => log::warn!("Conversation cache unavailable: {e}"),
    }

    match ApiClient::from_state(&state) {
        Ok(client) => {
            let overlay_clone = overlay.clone();
            let sidebar_clone = sidebar.clone();
            let rx = crate::utils::run_async_to_main(async move {
                let items = client.conversations().await?;
                if let Err(e) = Cache::open_default().and_then(|mut cache| cache.upsert_conversations(&items)) {
                    log::warn!("Could not cache conversations: {e}");
                }
                Ok::<_, crate::error::ClientError>(items)
            });
            rx.attach(None, move |res| {
                match res {
                    Ok(items) => sidebar_clone.set_items(items),
                    Err(err) => {
                        log::warn!("Loading conversations failed: {err}");
                        overlay_clone.add_toast(adw::Toast::new(&err.user_message()));
                    }
                }
                glib::ControlFlow::Continue
            });
        }
        Err(err) => overlay.add_toast(adw::Toast::new(&err.user_message())),
    }

    let current: Rc<RefCell<Option<Rc<ConversationView>>>> = Rc::new(RefCell::new(None));
    {
        let split = split.clone();
        let overlay = overlay.clone();
        let current = current.clone();
        let session = session.clone();
        sidebar.connect_selected(move |summary| {
            if let Some(previous) = current.borrow_mut().take() {
                previous.close();
            }
            let state = AppState::load();
            match ConversationView::new(&state, &session, &summary) {
                Ok(view) => {
                    split.set_content(Some(&view.widget()));
                    *current.borrow_mut() = Some(view);
                }
                Err(err) => {
                    log::warn!("Cannot open conversation {}: {err}", summary.id);
                    split.set_content(Some(&placeholder()));
                    overlay.add_toast(adw::Toast::new(&err.user_message()));
                }
            }
        });
    }

    {
        let app = app.clone();
        let window = window.clone();
        sign_out_btn.connect_clicked(move |_| {
            if let Some(view) = current.borrow_mut().take() {
                view.close();
            }
            let mut st = AppState::load();
            st.sign_out();
            if let Err(e) = st.save() {
                log::warn!("Failed to save settings: {e}");
            }
            if let Err(e) = Cache::open_default().and_then(|cache| cache.clear()) {
                log::warn!("Failed to clear cache: {e}");
            }
            crate::ui::login::show_login_window(&app);
            window.close();
        });
    }
}
