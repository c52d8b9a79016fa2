pub(crate) const LHEF_TAG_OPEN: &str = "<LesHouchesEvents version=";
pub(crate) const LHEF_LAST_LINE: &str = "</LesHouchesEvents>";
pub(crate) const COMMENT_START: &str = "<!--";
pub(crate) const COMMENT_END: &str = "-->";
pub(crate) const HEADER_START: &str = "<header";
pub(crate) const HEADER_END: &str = "</header>";
pub(crate) const INIT_START: &str = "<init";
pub(crate) const INIT_END: &str = "</init>";
pub(crate) const EVENT_START: &str = "<event";
pub(crate) const EVENT_END: &str = "</event>";
pub(crate) const EVENTGROUP_START: &str = "<eventgroup";

pub(crate) const INITRWGT: &str = "initrwgt";
pub(crate) const WEIGHTGROUP: &str = "weightgroup";
pub(crate) const WEIGHT: &str = "weight";
pub(crate) const RWGT: &str = "rwgt";
pub(crate) const WGT: &str = "wgt";
pub(crate) const ID: &str = "id";
