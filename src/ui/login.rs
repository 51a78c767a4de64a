use adw::prelude::*;
use adw::Application;
use gtk4 as gtk;

use crate::api::client::ApiClient;
use crate::api::models::Session;
use crate::app::AppState;
use crate::error::ClientError;

fn labelled_entry(form: &gtk::Box, placeholder: &str, value: &str) -> gtk::Entry {
    let entry = gtk::Entry::new();
    entry.set_placeholder_text(Some(placeholder));
    entry.set_text(value);
    entry.set_hexpand(true);
    form.append(&entry);
    entry
}

pub fn show_login_window(app: &Application) {
    let saved = AppState::load();

    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Catering Chat Sign In")
        .default_width(440)
        .default_height(380)
        .resizable(false)
        .build();

    let toast_overlay = adw::ToastOverlay::new();

    let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
    root.set_margin_top(24);
    root.set_margin_bottom(24);
    root.set_margin_start(24);
    root.set_margin_end(24);

    let title = gtk::Label::new(Some("Sign in to your marketplace account"));
    title.add_css_class("title-2");
    title.set_halign(gtk::Align::Start);
    root.append(&title);

    let form = gtk::Box::new(gtk::Orientation::Vertical, 8);
    let api_entry = labelled_entry(&form, "App URL (e.g. https://catering.example.com)", &saved.api_url);
    let backend_entry = labelled_entry(&form, "Backend URL (e.g. https://xyz.supabase.co)", &saved.backend_url);
    let key_entry = labelled_entry(&form, "Public API key", &saved.anon_key);
    let email_entry = labelled_entry(&form, "E-mail", "");
    email_entry.set_input_purpose(gtk::InputPurpose::Email);
    let pass_entry = gtk::PasswordEntry::new();
    pass_entry.set_placeholder_text(Some("Password"));
    pass_entry.set_hexpand(true);
    form.append(&pass_entry);
    root.append(&form);

    let status = gtk::Label::new(None);
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    root.append(&status);

    let login_btn = gtk::Button::with_label("Sign In");
    login_btn.add_css_class("suggested-action");
    login_btn.set_halign(gtk::Align::End);
    root.append(&login_btn);

    toast_overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let header_title = gtk::Label::new(Some("Catering Chat"));
    header.set_title_widget(Some(&header_title));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    let on_connect = {
        let app = app.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let login_btn = login_btn.clone();
        let pass_entry = pass_entry.clone();
        move || {
            let api_url = crate::utils::normalize_url(&api_entry.text());
            let backend_url = crate::utils::normalize_url(&backend_entry.text());
            let anon_key = key_entry.text().trim().to_string();
            let email = email_entry.text().trim().to_string();
            let password = pass_entry.text().to_string();
            if api_url.is_empty() || backend_url.is_empty() || anon_key.is_empty() || email.is_empty() || password.is_empty() {
                overlay.add_toast(adw::Toast::new("Please fill in every field."));
                return;
            }

            status.set_label("Signing in…");
            login_btn.set_sensitive(false);

            let (api_for_async, backend_for_async, key_for_async) = (api_url.clone(), backend_url.clone(), anon_key.clone());
            let rx: glib::Receiver<Result<Session, ClientError>> = crate::utils::run_async_to_main(async move {
                let client = ApiClient::new(&api_for_async, &backend_for_async, &key_for_async)?;
                client.sign_in(&email, &password).await
            });

            let status_label = status.clone();
            let app2 = app.clone();
            let window2 = window.clone();
            let overlay2 = overlay.clone();
            let button = login_btn.clone();
            rx.attach(None, move |res| {
                button.set_sensitive(true);
                match res {
                    Ok(session) => {
                        log::info!("Signed in as {} ({})", session.user_id, session.role.as_str());
                        let mut st = AppState::load();
                        st.api_url = api_url.clone();
                        st.backend_url = backend_url.clone();
                        st.anon_key = anon_key.clone();
                        st.apply_session(&session);
                        if let Err(e) = st.save() {
                            overlay2.add_toast(adw::Toast::new(&format!("Failed to save settings: {}", e)));
                        }
                        crate::ui::main_window::show_main_window(&app2, session);
                        window2.close();
                    }
                    Err(err) => {
                        log::warn!("Sign-in failed: {err}");
                        status_label.set_label("Sign-in failed");
                        overlay2.add_toast(adw::Toast::new(&err.user_message()));
                    }
                }
                glib::ControlFlow::Continue
            });
        }
    };

    use std::rc::Rc;
    let on_connect: Rc<dyn Fn()> = Rc::new(on_connect);
    {
        let on_connect = on_connect.clone();
        login_btn.connect_clicked(move |_| (on_connect)());
    }
    {
        let on_connect = on_connect.clone();
        pass_entry.connect_activate(move |_| (on_connect)());
    }

    window.present();
}
