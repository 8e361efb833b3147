use eyeball::{SharedObservable, Subscriber};
use serde::Serialize;

/// What the popup panel shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupContent {
    /// Id of the widget that opened the popup.
    pub id: String,
    /// Left edge in screen coordinates, already clamped on-screen.
    pub origin_x: f64,
    pub width: f64,
    /// Widget-specific payload for the shell to draw.
    pub body: serde_json::Value,
}

/// The single overlay panel driven by the presenter.
pub trait PopupPanel: Send + 'static {
    /// Whether the panel currently has key status.
    fn is_key(&self) -> bool;

    fn set_content(&mut self, content: PopupContent);

    /// Makes the panel key and orders it front.
    fn present(&mut self);

    fn order_out(&mut self);

    /// Drops key status without hiding.
    fn resign_key(&mut self) {}
}

/// Observable panel state of a [`HeadlessPanel`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupView {
    pub visible: bool,
    pub content: Option<PopupContent>,
}

/// Panel without a window. Its state is published for the bar renderer.
#[derive(Debug)]
pub struct HeadlessPanel {
    key: bool,
    view: SharedObservable<PopupView>,
}

impl Default for HeadlessPanel {
    fn default() -> Self { Self::new() }
}

impl HeadlessPanel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            key: false,
            view: SharedObservable::new(PopupView::default()),
        }
    }

    #[must_use]
    pub fn view(&self) -> PopupView { self.view.get() }

    #[must_use]
    pub fn subscribe(&self) -> Subscriber<PopupView> { self.view.subscribe() }

    /// Shared handle to the published view, kept by readers after the panel
    /// moves into the presenter.
    #[must_use]
    pub fn observable(&self) -> SharedObservable<PopupView> { self.view.clone() }

    fn update(&self, edit: impl FnOnce(&mut PopupView)) {
        let mut next = self.view.get();
        edit(&mut next);
        self.view.set_if_not_eq(next);
    }
}

impl PopupPanel for HeadlessPanel {
    fn is_key(&self) -> bool { self.key }

    fn set_content(&mut self, content: PopupContent) { self.update(|view| view.content = Some(content)); }

    fn present(&mut self) {
        self.key = true;
        self.update(|view| view.visible = true);
    }

    fn order_out(&mut self) {
        self.key = false;
        self.update(|view| view.visible = false);
    }

    fn resign_key(&mut self) { self.key = false; }
}
