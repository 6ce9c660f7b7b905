// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use tcc_gateway_types::{CrossType, EMPTY_PARAMETER, TRY_RESULT_PLACEHOLDER};
use tcc_gateway_utils::{Error, Result};

/// Binds the results of a try leg into a confirm parameter template.
///
/// Each `%CROSS_RESULT%` placeholder is replaced, in order, by one entry of
/// `try_result`. The template is returned untouched for `INVOKE` legs, when
/// it has no placeholder, or when there is nothing to bind. An empty template
/// becomes `{}`.
pub fn fill_try_result(
    template: &str,
    try_result: &[String],
    cross_type: CrossType,
) -> Result<String> {
    if template.is_empty() {
        return Ok(EMPTY_PARAMETER.to_owned());
    }
    if cross_type == CrossType::Invoke {
        return Ok(template.to_owned());
    }
    let placeholders = template.matches(TRY_RESULT_PLACEHOLDER).count();
    if try_result.is_empty() || placeholders == 0 {
        return Ok(template.to_owned());
    }
    if placeholders != try_result.len() {
        return Err(Error::PlaceholderMismatch {
            placeholders,
            results: try_result.len(),
        });
    }
    let mut filled = String::with_capacity(template.len());
    let mut values = try_result.iter();
    let mut pieces = template.split(TRY_RESULT_PLACEHOLDER).peekable();
    while let Some(piece) = pieces.next() {
        filled.push_str(piece);
        if pieces.peek().is_some() {
            if let Some(value) = values.next() {
                filled.push_str(value);
            }
        }
    }
    Ok(filled)
}
