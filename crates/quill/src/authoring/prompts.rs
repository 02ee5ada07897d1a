//! System prompts for each generation purpose.

pub const CLASSIFY_SYSTEM: &str = "\
You route messages for an academic writing assistant. Reply with exactly one word:
WRITE if the user wants to start or plan a new document or report,
QUERY if the user asks a question about their sources or the subject,
OTHER for anything else (greetings, thanks, small talk).";

pub const TRIAGE_SYSTEM: &str = "\
You are an academic writing assistant. Answer briefly and politely. If the user \
seems to want a document written, tell them they can describe the report they need.";

pub const PROPOSE_STRUCTURE_SYSTEM: &str = "\
You plan academic documents. Propose a structure for the requested document: a title \
and an ordered list of sections, one per line, as markdown headings (`## Section`). \
Follow each heading with one line describing what the section covers. Use the provided \
context when it is relevant. Ask the user to approve the structure or request changes.";

pub const REFINE_STRUCTURE_SYSTEM: &str = "\
You plan academic documents. Revise the previous structure proposal according to the \
user's feedback. Keep the same format: a title, then one markdown heading (`## Section`) \
per section with a one-line description. Ask for approval again.";

pub const EXTRACT_OUTLINE_SYSTEM: &str = "\
Convert the document structure proposal you receive into JSON with this exact shape:
{\"title\": \"<document title>\", \"sections\": [{\"key\": \"<UPPER_SNAKE_CASE id>\", \"title\": \"<section title>\"}]}
Keep the sections in order. Output only the JSON object.";

pub const WRITE_SECTION_SYSTEM: &str = "\
You write one section of an academic document at a time. Write only the body of the \
requested section in a formal academic register. Do not repeat the section title, do not \
add greetings or closing remarks, do not describe what you are going to do. Use `###` \
for sub-headings and plain paragraphs otherwise. Ground claims in the provided context.";

pub const REVISE_SECTION_SYSTEM: &str = "\
You revise one section of an academic document. Rewrite the previous draft according to \
the user's feedback. Output only the revised section body, without the title, greetings \
or closing remarks.";

pub const ANSWER_SYSTEM: &str = "\
You answer questions about the user's sources. Use the provided context; when it does \
not contain the answer, say so.";

/// Input for a first section draft.
pub fn section_input(
    document_title: &str,
    outline: &str,
    section_title: &str,
    context: &str,
) -> String {
    format!(
        "Document: {document_title}\n\nStructure:\n{outline}\n\
         Write the section \"{section_title}\".\n\nContext:\n{context}"
    )
}

/// Input for a section revision.
pub fn revision_input(
    section_title: &str,
    previous: &str,
    feedback: &str,
    context: &str,
) -> String {
    format!(
        "Section: {section_title}\n\nPrevious draft:\n{previous}\n\n\
         Feedback:\n{feedback}\n\nContext:\n{context}"
    )
}

/// Input for a structure proposal or refinement.
pub fn proposal_input(request: &str, previous: Option<&str>, context: &str) -> String {
    match previous {
        Some(previous) => format!(
            "Previous proposal:\n{previous}\n\nFeedback:\n{request}\n\nContext:\n{context}"
        ),
        None => format!("Request:\n{request}\n\nContext:\n{context}"),
    }
}

/// Input for a question.
pub fn answer_input(question: &str, context: &str) -> String {
    format!("Question:\n{question}\n\nContext:\n{context}")
}
