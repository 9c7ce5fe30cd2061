//! Facts derived from the driven page's location.

use crate::constants::paths::{REPORTED_TWEET_ID, REPORT_FRAME, STATUS, WITH_REPLIES};
use crate::models::{Handle, TweetId};

/// Path portion of a URL, without scheme, host, query or fragment.
fn path_of(url: &str) -> &str {
    let without_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let path = if url.contains("://") {
        match without_scheme.find('/') {
            Some(idx) => &without_scheme[idx..],
            None => "/",
        }
    } else {
        without_scheme
    };
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

fn segments(url: &str) -> Vec<&str> {
    path_of(url)
        .trim_start_matches('/')
        .split('/')
        .collect()
}

/// Subject of a `/<user>/with_replies` page.
pub fn user_page_subject(url: &str) -> Option<Handle> {
    match segments(url).as_slice() {
        [user, tail] if *tail == WITH_REPLIES => Handle::new(user),
        _ => None,
    }
}

/// Author of a `/<user>/status/<id>` page.
pub fn tweet_page_subject(url: &str) -> Option<Handle> {
    match segments(url).as_slice() {
        [user, status, id] if *status == STATUS && TweetId::new(id).is_some() => Handle::new(user),
        _ => None,
    }
}

/// Numeric last path segment of the location.
pub fn tweet_page_id(url: &str) -> Option<TweetId> {
    segments(url).last().and_then(|last| TweetId::new(last))
}

/// Id named by the `reported_tweet_id` query parameter of a report sub-document.
pub fn reported_tweet_id(frame_url: &str) -> Option<TweetId> {
    let query = frame_url.split_once('?').map(|(_, q)| q).unwrap_or(frame_url);
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == REPORTED_TWEET_ID)
        .and_then(|(_, value)| TweetId::new(value))
}

pub fn user_page_url(base_url: &str, handle: &Handle) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), handle, WITH_REPLIES)
}

pub fn tweet_page_url(base_url: &str, author: &Handle, tweet_id: &TweetId) -> String {
    format!(
        "{}/{}/{}/{}",
        base_url.trim_end_matches('/'),
        author,
        STATUS,
        tweet_id
    )
}

/// Location of the report sub-document opened for `tweet_id`.
pub fn report_frame_url(base_url: &str, tweet_id: &TweetId) -> String {
    format!(
        "{}/{}?{}={}",
        base_url.trim_end_matches('/'),
        REPORT_FRAME,
        REPORTED_TWEET_ID,
        tweet_id
    )
}
