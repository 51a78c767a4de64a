use adw::prelude::*;
use adw::Application;

fn main() -> adw::glib::ExitCode {
    catering_chat::logging::init();
    log::info!("Starting catering-chat {}", env!("CARGO_PKG_VERSION"));

    let app = Application::builder()
        .application_id("com.example.CateringChat")
        .build();
    app.connect_activate(|app| {
        catering_chat::app::build_ui(app);
    });
    app.run()
}
