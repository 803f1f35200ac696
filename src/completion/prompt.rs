/// Libraries the sandbox template has installed; the model is told it may use them.
pub const AVAILABLE_LIBRARIES: &str = "@mui/material, @material-ui/core, @mui/icons-material, @emotion/styled, @material-ui/icons, @emotion/react and \"react-router-dom\": \"^6.11.2\"";

pub fn build_prompt(code: &str, instruction: &str) -> String {
    format!(
        "I am working on a web application using React. My current code snippet is:

{code}

I need to make the following changes or additions to my code:

User: {instruction} .

For this, I have the following dependencies installed:
\"{AVAILABLE_LIBRARIES}\" .
I would like to use these dependencies to create a modern and visually appealing appearance for my application.
Could you provide me with the updated code that incorporates these changes or additions?
"
    )
}
