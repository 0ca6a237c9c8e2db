//! Scripted in-memory browser for integration tests
//!
//! Pages are registered by URL with a flat list of nodes. Selectors support a
//! tag, `.class`, `#id` and `[attr="value"]` parts on a single compound
//! selector; `option` children are linked to their `<select>` by id.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{sleep, Instant};

use ssc_checker::{Driver, DriverError, DriverResult, LogEntry, Locator};

const TICK: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
pub enum OnClick {
    Navigate(String),
    Alert(String),
    Reveal(String),
    SetText(String, String),
    /// Emit a console entry
    Log(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub tag: String,
    pub attrs: HashMap<String, String>,
    pub text: String,
    pub selected: bool,
    pub hidden: bool,
    pub parent: Option<String>,
    pub frame: Option<String>,
    pub appear_after: Option<Duration>,
    pub remove_after: Option<Duration>,
    pub on_click: Vec<OnClick>,
}

impl Node {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: HashMap::new(),
            text: String::new(),
            selected: false,
            hidden: false,
            parent: None,
            frame: None,
            appear_after: None,
            remove_after: None,
            on_click: Vec::new(),
        }
    }

    pub fn input(kind: &str, name: &str, value: &str) -> Self {
        Self::new("input").attr("type", kind).attr("name", name).attr("value", value)
    }

    pub fn option(select_id: &str, value: &str) -> Self {
        let mut node = Self::new("option").attr("value", value).text(value);
        node.parent = Some(select_id.to_string());
        node
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn in_frame(mut self, frame_id: &str) -> Self {
        self.frame = Some(frame_id.to_string());
        self
    }

    pub fn appear_after(mut self, ms: u64) -> Self {
        self.appear_after = Some(Duration::from_millis(ms));
        self
    }

    pub fn remove_after(mut self, ms: u64) -> Self {
        self.remove_after = Some(Duration::from_millis(ms));
        self
    }

    pub fn on_click(mut self, effect: OnClick) -> Self {
        self.on_click.push(effect);
        self
    }

    fn matches(&self, locator: &Locator) -> bool {
        match locator {
            Locator::Css(selector) => self.matches_css(selector),
            Locator::Id(id) => self.attrs.get("id") == Some(id),
            Locator::Name(name) => self.attrs.get("name") == Some(name),
            Locator::ClassName(class) => self.has_class(class),
            Locator::TagName(tag) => self.tag == *tag,
            Locator::LinkText(text) => self.tag == "a" && self.text == *text,
            Locator::Xpath(xpath) => xpath.strip_prefix("//").is_some_and(|tag| self.tag == tag),
        }
    }

    fn has_class(&self, class: &str) -> bool {
        self.attrs
            .get("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    fn matches_css(&self, selector: &str) -> bool {
        let mut rest = selector.trim();
        let tag_end = rest.find(['.', '#', '[']).unwrap_or(rest.len());
        let (tag, tail) = rest.split_at(tag_end);
        if !tag.is_empty() && tag != self.tag {
            return false;
        }
        rest = tail;

        while !rest.is_empty() {
            if let Some(attr) = rest.strip_prefix('[') {
                let Some(end) = attr.find(']') else { return false };
                let (name, value) = match attr[..end].split_once('=') {
                    Some((name, value)) => (name, Some(value.trim_matches('"'))),
                    None => (&attr[..end], None),
                };
                let ok = match value {
                    Some(value) => self.attrs.get(name).map(String::as_str) == Some(value),
                    None => self.attrs.contains_key(name),
                };
                if !ok {
                    return false;
                }
                rest = &attr[end + 1..];
                continue;
            }

            let marker = &rest[..1];
            let body = &rest[1..];
            let end = body.find(['.', '#', '[']).unwrap_or(body.len());
            let ok = match marker {
                "." => self.has_class(&body[..end]),
                "#" => self.attrs.get("id").map(String::as_str) == Some(&body[..end]),
                _ => false,
            };
            if !ok {
                return false;
            }
            rest = &body[end..];
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub html: String,
    pub nodes: Vec<Node>,
    pub logs: Vec<String>,
}

impl Page {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            ..Default::default()
        }
    }

    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn log(mut self, message: &str) -> Self {
        self.logs.push(message.to_string());
        self
    }
}

/// Handle to a node of the page loaded at `generation`.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeElement {
    generation: usize,
    index: usize,
}

#[derive(Default)]
struct State {
    pages: HashMap<String, Page>,
    url: String,
    html: String,
    nodes: Vec<Node>,
    generation: usize,
    loaded_at: Option<Instant>,
    frame: Option<String>,
    logs: Vec<LogEntry>,
    alert: Option<String>,
    answered: Vec<(String, bool)>,
    visits: Vec<String>,
}

impl State {
    fn load(&mut self, url: &str) -> DriverResult<()> {
        let page = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| DriverError::Command(format!("no page at {}", url)))?;
        self.url = url.to_string();
        self.html = page.html;
        self.nodes = page.nodes;
        self.generation += 1;
        self.loaded_at = Some(Instant::now());
        self.frame = None;
        self.visits.push(url.to_string());
        self.logs
            .extend(page.logs.iter().map(|message| LogEntry::new("SEVERE", message.as_str())));
        Ok(())
    }

    fn present(&self, node: &Node) -> bool {
        let elapsed = self.loaded_at.map(|t| t.elapsed()).unwrap_or_default();
        node.appear_after.map_or(true, |after| elapsed >= after)
            && node.remove_after.map_or(true, |after| elapsed < after)
    }

    fn node(&self, element: &FakeElement) -> DriverResult<&Node> {
        if element.generation != self.generation {
            return Err(DriverError::StaleElement(format!("element {}", element.index)));
        }
        self.nodes
            .get(element.index)
            .filter(|node| self.present(node))
            .ok_or_else(|| DriverError::StaleElement(format!("element {}", element.index)))
    }

    fn find(&self, locator: &Locator, parent: Option<&str>) -> Vec<FakeElement> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| self.present(node) && node.matches(locator))
            .filter(|(_, node)| match parent {
                Some(parent) => node.parent.as_deref() == Some(parent),
                None => node.frame == self.frame,
            })
            .map(|(index, _)| FakeElement {
                generation: self.generation,
                index,
            })
            .collect()
    }

    fn click(&mut self, element: &FakeElement) -> DriverResult<()> {
        let node = self.node(element)?.clone();
        let index = element.index;

        match (node.tag.as_str(), node.attrs.get("type").map(String::as_str)) {
            ("input", Some("checkbox")) => self.nodes[index].selected = !node.selected,
            ("input", Some("radio")) => {
                for other in self.nodes.iter_mut() {
                    if other.attrs.get("type").map(String::as_str) == Some("radio")
                        && other.attrs.get("name") == node.attrs.get("name")
                    {
                        other.selected = false;
                    }
                }
                self.nodes[index].selected = true;
            }
            ("option", _) => {
                let multiple = self.nodes.iter().any(|select| {
                    select.tag == "select"
                        && select.attrs.get("id") == node.parent.as_ref()
                        && select.attrs.contains_key("multiple")
                });
                if multiple {
                    self.nodes[index].selected = !node.selected;
                } else {
                    for other in self.nodes.iter_mut().filter(|o| o.parent == node.parent) {
                        other.selected = false;
                    }
                    self.nodes[index].selected = true;
                }
            }
            _ => {}
        }

        for effect in node.on_click {
            match effect {
                OnClick::Navigate(url) => self.load(&url)?,
                OnClick::Alert(text) => self.alert = Some(text),
                OnClick::Reveal(id) => {
                    for other in self.nodes.iter_mut().filter(|o| o.attrs.get("id") == Some(&id)) {
                        other.hidden = false;
                    }
                }
                OnClick::SetText(id, text) => {
                    for other in self.nodes.iter_mut().filter(|o| o.attrs.get("id") == Some(&id)) {
                        other.text = text.clone();
                    }
                }
                OnClick::Log(message) => self.logs.push(LogEntry::new("SEVERE", message.as_str())),
            }
        }
        Ok(())
    }
}

/// In-memory [`Driver`].
#[derive(Default)]
pub struct FakeBrowser {
    state: Mutex<State>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, page: Page) -> Self {
        self.state.lock().pages.insert(url.to_string(), page);
        self
    }

    /// Open a dialog as a script would
    pub fn raise_alert(&self, text: &str) {
        self.state.lock().alert = Some(text.to_string());
    }

    /// Dialogs answered so far: (text, accepted)
    pub fn answered(&self) -> Vec<(String, bool)> {
        self.state.lock().answered.clone()
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().visits.clone()
    }

    /// `value` attributes of the selected nodes matching `locator`
    pub fn selected_values(&self, locator: &Locator) -> Vec<String> {
        let state = self.state.lock();
        state
            .nodes
            .iter()
            .filter(|node| node.selected && node.matches(locator))
            .filter_map(|node| node.attrs.get("value").cloned())
            .collect()
    }

    pub fn value_of(&self, locator: &Locator) -> Option<String> {
        let state = self.state.lock();
        state
            .nodes
            .iter()
            .find(|node| node.matches(locator))
            .and_then(|node| node.attrs.get("value").cloned())
    }

    async fn answer(&self, timeout: Duration, accept: bool) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut state = self.state.lock();
                if let Some(text) = state.alert.take() {
                    state.answered.push((text, accept));
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout("native dialog".to_string()));
            }
            sleep(TICK).await;
        }
    }
}

#[async_trait]
impl Driver for FakeBrowser {
    type Element = FakeElement;

    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.state.lock().load(url)
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn outer_html(&self) -> DriverResult<String> {
        Ok(self.state.lock().html.clone())
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<FakeElement>> {
        Ok(self.state.lock().find(locator, None))
    }

    async fn find_all_in(&self, parent: &FakeElement, locator: &Locator) -> DriverResult<Vec<FakeElement>> {
        let state = self.state.lock();
        let parent_id = state.node(parent)?.attrs.get("id").cloned().unwrap_or_default();
        Ok(state.find(locator, Some(&parent_id)))
    }

    async fn wait_located(&self, locator: &Locator, timeout: Duration) -> DriverResult<FakeElement> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(first) = self.state.lock().find(locator, None).into_iter().next() {
                return Ok(first);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout(locator.to_string()));
            }
            sleep(TICK).await;
        }
    }

    async fn wait_visible(&self, element: &FakeElement, timeout: Duration) -> DriverResult<FakeElement> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_displayed(element).await? {
                return Ok(element.clone());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout("element visibility".to_string()));
            }
            sleep(TICK).await;
        }
    }

    async fn is_displayed(&self, element: &FakeElement) -> DriverResult<bool> {
        Ok(!self.state.lock().node(element)?.hidden)
    }

    async fn tag_name(&self, element: &FakeElement) -> DriverResult<String> {
        Ok(self.state.lock().node(element)?.tag.clone())
    }

    async fn attribute(&self, element: &FakeElement, name: &str) -> DriverResult<Option<String>> {
        Ok(self.state.lock().node(element)?.attrs.get(name).cloned())
    }

    async fn text(&self, element: &FakeElement) -> DriverResult<String> {
        let state = self.state.lock();
        let node = state.node(element)?;
        Ok(if node.hidden { String::new() } else { node.text.clone() })
    }

    async fn is_selected(&self, element: &FakeElement) -> DriverResult<bool> {
        Ok(self.state.lock().node(element)?.selected)
    }

    async fn click(&self, element: &FakeElement) -> DriverResult<()> {
        self.state.lock().click(element)
    }

    async fn send_keys(&self, element: &FakeElement, text: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.node(element)?;
        let value = state.nodes[element.index].attrs.entry("value".to_string()).or_default();
        value.push_str(text);
        Ok(())
    }

    async fn clear(&self, element: &FakeElement) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.node(element)?;
        state.nodes[element.index].attrs.insert("value".to_string(), String::new());
        Ok(())
    }

    async fn console_logs(&self) -> DriverResult<Vec<LogEntry>> {
        Ok(std::mem::take(&mut self.state.lock().logs))
    }

    async fn switch_to_frame(&self, locator: &Locator) -> DriverResult<()> {
        let mut state = self.state.lock();
        let frame = state
            .find(locator, None)
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::Command(format!("no frame {}", locator)))?;
        let id = state.node(&frame)?.attrs.get("id").cloned();
        state.frame = id;
        Ok(())
    }

    async fn switch_to_default_frame(&self) -> DriverResult<()> {
        self.state.lock().frame = None;
        Ok(())
    }

    async fn accept_alert(&self, timeout: Duration) -> DriverResult<()> {
        self.answer(timeout, true).await
    }

    async fn dismiss_alert(&self, timeout: Duration) -> DriverResult<()> {
        self.answer(timeout, false).await
    }
}
