// SPDX-License-Identifier: MPL-2.0

pub(crate) use std::collections::BTreeMap;

pub(crate) use log::{debug, trace};

pub(crate) use crate::{error::Error, Result};
