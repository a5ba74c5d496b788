use std::sync::Arc;

use crate::application::access::AccessGuard;
use crate::application::books::BookService;
use crate::application::events::EventNotifier;

#[derive(Clone)]
pub struct ApiState {
    pub books: Arc<BookService>,
    pub guard: Arc<AccessGuard>,
    pub events: Arc<dyn EventNotifier>,
}
