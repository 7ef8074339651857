//! JSP-flavoured implicit objects: the servlet set plus a page context and
//! its writer.

use super::attributes::AttributeMap;
use super::web::{RequestWrapper, ServletConfig, ServletContext, ServletFields, ServletResponse, WebImplicitObjects};
use super::{ImplicitSlot, Inject, InjectionError};
use crate::test_case::TestCase;
use cactus_common::failure::TestFailure;
use std::{any::Any, io, sync::Arc};

/// Attribute scopes searched by [`PageContext::find_attribute`], innermost
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Page,
    Request,
    Session,
    Application,
}

/// Writer for page output. Text goes straight into the response body.
#[derive(Debug)]
pub struct JspWriter {
    response: Arc<ServletResponse>,
}

impl JspWriter {
    pub fn new(response: Arc<ServletResponse>) -> Self {
        Self { response }
    }

    pub fn print(&self, text: &str) -> io::Result<()> {
        self.response.write_str(text)
    }

    pub fn println(&self, text: &str) -> io::Result<()> {
        self.print(text)?;
        self.newline()
    }

    pub fn newline(&self) -> io::Result<()> {
        self.response.write_str("\n")
    }
}

#[derive(Debug)]
pub struct PageContext {
    page: AttributeMap,
    request: Arc<RequestWrapper>,
    response: Arc<ServletResponse>,
    config: Arc<ServletConfig>,
    context: Arc<ServletContext>,
    out: Arc<JspWriter>,
}

impl PageContext {
    pub fn new(
        request: Arc<RequestWrapper>,
        response: Arc<ServletResponse>,
        config: Arc<ServletConfig>,
        context: Arc<ServletContext>,
        out: Arc<JspWriter>,
    ) -> Self {
        Self {
            page: AttributeMap::new(),
            request,
            response,
            config,
            context,
            out,
        }
    }

    pub fn request(&self) -> &Arc<RequestWrapper> {
        &self.request
    }

    pub fn response(&self) -> &Arc<ServletResponse> {
        &self.response
    }

    pub fn servlet_config(&self) -> &Arc<ServletConfig> {
        &self.config
    }

    pub fn servlet_context(&self) -> &Arc<ServletContext> {
        &self.context
    }

    pub fn out(&self) -> &Arc<JspWriter> {
        &self.out
    }

    /// Page-scope attributes.
    pub fn attributes(&self) -> &AttributeMap {
        &self.page
    }

    pub fn set_attribute<T: Any + Send + Sync>(&self, name: &str, value: T, scope: Scope) {
        match scope {
            Scope::Page => self.page.set(name, value),
            Scope::Request => self.request.attributes().set(name, value),
            Scope::Session => {
                if let Some(session) = self.request.session(true) {
                    session.attributes().set(name, value);
                }
            }
            Scope::Application => self.context.attributes().set(name, value),
        }
    }

    pub fn get_attribute<T: Any + Send + Sync>(&self, name: &str, scope: Scope) -> Option<Arc<T>> {
        match scope {
            Scope::Page => self.page.get(name),
            Scope::Request => self.request.attributes().get(name),
            Scope::Session => self.request.session(false)?.attributes().get(name),
            Scope::Application => self.context.attributes().get(name),
        }
    }

    /// Looks the attribute up in page, request, session and application
    /// scope, in that order. Never creates a session.
    pub fn find_attribute<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        [Scope::Page, Scope::Request, Scope::Session, Scope::Application]
            .into_iter()
            .find_map(|scope| self.get_attribute(name, scope))
    }

    /// Innermost scope holding the attribute.
    pub fn attributes_scope(&self, name: &str) -> Option<Scope> {
        if self.page.contains(name) {
            Some(Scope::Page)
        } else if self.request.attributes().contains(name) {
            Some(Scope::Request)
        } else if self
            .request
            .session(false)
            .is_some_and(|s| s.attributes().contains(name))
        {
            Some(Scope::Session)
        } else if self.context.attributes().contains(name) {
            Some(Scope::Application)
        } else {
            None
        }
    }
}

/// Slots a JSP test exposes: the servlet slots plus page context and writer.
#[derive(Debug, Clone, Default)]
pub struct JspFields {
    pub servlet: ServletFields,
    pub page_context: Option<Arc<PageContext>>,
    pub out: Option<Arc<JspWriter>>,
}

impl JspFields {
    pub fn page_context(&self) -> Result<&Arc<PageContext>, TestFailure> {
        self.page_context
            .as_ref()
            .ok_or_else(|| TestFailure::assertion("No page context was injected into this test"))
    }

    pub fn out(&self) -> Result<&Arc<JspWriter>, TestFailure> {
        self.out
            .as_ref()
            .ok_or_else(|| TestFailure::assertion("No page writer was injected into this test"))
    }
}

/// Implicit objects of a request reaching the JSP redirector.
#[derive(Debug, Clone)]
pub struct JspImplicitObjects {
    pub web: WebImplicitObjects,
    pub out: Arc<JspWriter>,
}

impl JspImplicitObjects {
    pub fn new(web: WebImplicitObjects) -> Self {
        let out = Arc::new(JspWriter::new(web.response.clone()));
        Self { web, out }
    }

    pub(crate) fn fill(&self, fields: &mut JspFields) -> Result<(), InjectionError> {
        let request = self.web.fill(&mut fields.servlet)?;
        fields.page_context = Some(Arc::new(PageContext::new(
            request,
            self.web.response.clone(),
            self.web.config.clone(),
            self.web.context.clone(),
            self.out.clone(),
        )));
        fields.out = Some(self.out.clone());
        Ok(())
    }
}

impl Inject for JspImplicitObjects {
    fn inject_into(&self, test: &mut dyn TestCase) -> Result<(), InjectionError> {
        match test.implicit_slot() {
            Some(ImplicitSlot::Jsp(fields)) => self.fill(fields),
            // A plain servlet test run through the JSP redirector still gets
            // its servlet objects.
            Some(ImplicitSlot::Servlet(fields)) => self.web.fill(fields).map(|_| ()),
            _ => Ok(()),
        }
    }
}
