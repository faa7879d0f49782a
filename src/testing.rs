//! Scripted in-memory page used in place of a real browser.
//!
//! A `FakeDriver` walks through a list of `FakePage`s; clicking an element with
//! `leads_to` set switches the current page, which is how a test models the
//! site advancing after an answer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::driver::{BrowserError, Driver, Locator};

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub visible: bool,
    pub text: String,
    pub attributes: HashMap<String, String>,
    /// Native clicks that fail before one succeeds.
    pub click_failures: u32,
    pub script_click_fails: bool,
    pub leads_to: Option<usize>,
}

impl FakeElement {
    pub fn visible() -> Self {
        Self {
            visible: true,
            ..Default::default()
        }
    }

    pub fn hidden() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.into();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn click_failures(mut self, failures: u32) -> Self {
        self.click_failures = failures;
        self
    }

    pub fn unclickable(self) -> Self {
        self.click_failures(u32::MAX).script_fails()
    }

    pub fn script_fails(mut self) -> Self {
        self.script_click_fails = true;
        self
    }

    pub fn leads_to(mut self, page: usize) -> Self {
        self.leads_to = Some(page);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    elements: HashMap<String, FakeElement>,
    broken: bool,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: Locator, element: FakeElement) -> Self {
        self.elements.insert(locator.to_string(), element);
        self
    }

    /// Every lookup on this page fails, as a page torn down mid-navigation would.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Navigate(String),
    Find(String),
    Click(String),
    Script(String, String),
    Evaluate(String),
    Close,
}

#[derive(Debug, Default)]
struct Inner {
    pages: Vec<FakePage>,
    current: usize,
    calls: Vec<Call>,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    inner: Arc<Mutex<Inner>>,
}

impl FakeDriver {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                pages,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn current_page(&self) -> usize {
        self.lock().current
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn finds(&self, locator: &Locator) -> usize {
        let key = locator.to_string();
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Find(k) if *k == key))
            .count()
    }

    pub fn clicks(&self, locator: &Locator) -> usize {
        let key = locator.to_string();
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Click(k) if *k == key))
            .count()
    }

    pub fn script_calls(&self, locator: &Locator) -> Vec<String> {
        let key = locator.to_string();
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Script(k, f) if *k == key => Some(f.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Inner {
    fn page(&self) -> Result<&FakePage, BrowserError> {
        if self.closed {
            return Err(BrowserError::Closed);
        }
        let page = self
            .pages
            .get(self.current)
            .ok_or_else(|| BrowserError::Protocol("no page loaded".into()))?;
        if page.broken {
            return Err(BrowserError::Protocol("page is navigating".into()));
        }
        Ok(page)
    }

    fn element_mut(&mut self, key: &str) -> Result<&mut FakeElement, BrowserError> {
        self.page()?;
        let current = self.current;
        self.pages[current]
            .elements
            .get_mut(key)
            .ok_or_else(|| BrowserError::Detached(key.into()))
    }

    fn element(&self, key: &str) -> Result<&FakeElement, BrowserError> {
        self.page()?
            .elements
            .get(key)
            .ok_or_else(|| BrowserError::Detached(key.into()))
    }

    fn follow(&mut self, target: Option<usize>) {
        if let Some(page) = target {
            self.current = page;
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    type Element = String;

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Navigate(url.into()));
        if inner.closed {
            return Err(BrowserError::Closed);
        }
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> Result<Option<String>, BrowserError> {
        let key = locator.to_string();
        let mut inner = self.lock();
        inner.calls.push(Call::Find(key.clone()));
        Ok(inner.page()?.elements.contains_key(&key).then_some(key))
    }

    async fn is_visible(&self, element: &String) -> Result<bool, BrowserError> {
        Ok(self.lock().element(element)?.visible)
    }

    async fn text(&self, element: &String) -> Result<String, BrowserError> {
        Ok(self.lock().element(element)?.text.clone())
    }

    async fn attribute(&self, element: &String, name: &str) -> Result<Option<String>, BrowserError> {
        Ok(self.lock().element(element)?.attributes.get(name).cloned())
    }

    async fn click(&self, element: &String) -> Result<(), BrowserError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Click(element.clone()));
        let target = inner.element_mut(element)?;
        if target.click_failures > 0 {
            target.click_failures -= 1;
            return Err(BrowserError::NotInteractable(format!(
                "{element} is obscured by another element"
            )));
        }
        let next = target.leads_to;
        inner.follow(next);
        Ok(())
    }

    async fn call_on(&self, element: &String, function: &str) -> Result<(), BrowserError> {
        let mut inner = self.lock();
        inner
            .calls
            .push(Call::Script(element.clone(), function.into()));
        let target = inner.element_mut(element)?;
        if function.contains("this.click()") {
            if target.script_click_fails {
                return Err(BrowserError::Script(format!("{element} ignored the click")));
            }
            let next = target.leads_to;
            inner.follow(next);
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<(), BrowserError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Evaluate(script.into()));
        inner.page().map(|_| ())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        let inner = self.lock();
        let page = inner.page()?;
        let mut keys: Vec<_> = page.elements.keys().cloned().collect();
        keys.sort();
        Ok(format!("<html><!-- {} --></html>", keys.join(", ")))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Close);
        if inner.closed {
            return Err(BrowserError::Closed);
        }
        inner.closed = true;
        Ok(())
    }
}

/// Page fixtures shaped like the game site.
pub mod site {
    use super::{FakeElement, FakePage};
    use crate::driver::Locator;
    use crate::game::{PLAY_BUTTON, THEME_SELECTION};
    use crate::reader;

    /// Home page (0) and theme picker (1) offering themes 1, 2 and 14, followed
    /// by `rest` starting at index 2.
    pub fn game(rest: Vec<FakePage>) -> Vec<FakePage> {
        let mut picker = FakePage::new().with(THEME_SELECTION, FakeElement::visible());
        for theme in ["1", "2", "14"] {
            picker = picker.with(
                Locator::Css(
                    format!("li[class*=\"li-game\"][onclick*=\"chooseTheme('{theme}')\"]").into(),
                ),
                FakeElement::visible().leads_to(2),
            );
        }
        let mut pages = vec![
            FakePage::new().with(PLAY_BUTTON, FakeElement::visible().leads_to(1)),
            picker,
        ];
        pages.extend(rest);
        pages
    }

    pub fn question(text: &str) -> FakePage {
        FakePage::new()
            .with(reader::QUESTION_BLOCK, FakeElement::visible())
            .with(reader::QUESTION_LABEL, FakeElement::visible().text(text))
    }

    pub fn guess(name: &str, description: &str) -> FakePage {
        FakePage::new()
            .with(reader::PROPOSE_BLOCK, FakeElement::visible())
            .with(reader::PROPOSED_NAME, FakeElement::visible().text(name))
            .with(reader::PROPOSED_DESCRIPTION, FakeElement::visible().text(description))
            .with(
                reader::PROPOSED_IMAGE,
                FakeElement::visible().attr("src", &format!("https://photos.example/{name}.jpg")),
            )
    }

    pub fn finished(text: &str) -> FakePage {
        FakePage::new().with(Locator::css(".end-text"), FakeElement::visible().text(text))
    }
}
