//! Opening authorization and picker URLs outside the client process.

use super::ClientError;

pub trait Launcher: Send + Sync {
    fn open(&self, url: &str) -> Result<(), ClientError>;
}

/// Opens URLs with the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl Launcher for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), ClientError> {
        open::that(url).map_err(|e| ClientError::Launch(e.to_string()))
    }
}

/// Prints the URL instead of opening it, for headless terminals.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintUrl;

impl Launcher for PrintUrl {
    fn open(&self, url: &str) -> Result<(), ClientError> {
        println!("Open this URL in your browser:\n{url}\n");
        Ok(())
    }
}

impl<L: Launcher + ?Sized> Launcher for Box<L> {
    fn open(&self, url: &str) -> Result<(), ClientError> {
        (**self).open(url)
    }
}
